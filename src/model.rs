//! 核心数据模型（§3）。
//!
//! 坐标约定：除非另有说明，所有坐标都是 0-based 半开区间。"BWT 空间"
//! 是正向+反向参考拼接后的坐标系，长度 2·G（G 为正向基因组长度）；
//! p∈[0,G) 为正向链，p∈[G,2G) 编码反向互补位置 `2G-1-p`。

use serde::{Deserialize, Serialize};

/// 一个种子：FM 索引回溯搜索得到的一次精确匹配命中。一旦构建即不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    /// BWT 空间中的参考起点。
    pub rbeg: i64,
    pub qbeg: i32,
    pub len: i32,
    /// 惯例上等于 len * match_score。
    pub score: i32,
}

impl Seed {
    #[inline]
    pub fn qend(&self) -> i32 {
        self.qbeg + self.len
    }

    #[inline]
    pub fn rend(&self) -> i64 {
        self.rbeg + self.len as i64
    }
}

/// 一条链：同一 contig 上、按 rbeg 排序的共线种子序列。
#[derive(Debug, Clone)]
pub struct Chain {
    pub seeds: Vec<Seed>,
    /// 种子长度贡献之和，扣除重叠部分。
    pub weight: i32,
    pub rid: i32,
    /// 第一个种子的 rbeg。
    pub pos: i64,
    pub is_alt: bool,
    /// 过滤标志：非 0 表示已被 ChainFilter 丢弃。
    pub kept: i32,
    pub frac_rep: f32,
    /// 链中所有种子共享的链方向。两条链即使在同一 rid 上也绝不会混合
    /// 正反向种子：BWT 空间中正向/反向命中分别落在 query 坐标前进方向
    /// 相反的两套 seed 里，天然分属不同链。
    pub is_rev: bool,
}

impl Chain {
    pub fn from_seeds(mut seeds: Vec<Seed>, rid: i32, is_alt: bool, is_rev: bool) -> Self {
        seeds.sort_by_key(|s| s.rbeg);
        let pos = seeds.first().map(|s| s.rbeg).unwrap_or(0);
        Self {
            seeds,
            weight: 0,
            rid,
            pos,
            is_alt,
            kept: 0,
            frac_rep: 0.0,
            is_rev,
        }
    }

    pub fn query_span(&self) -> (i32, i32) {
        let qb = self.seeds.iter().map(|s| s.qbeg).min().unwrap_or(0);
        let qe = self.seeds.iter().map(|s| s.qend()).max().unwrap_or(0);
        (qb, qe)
    }
}

/// `secondary` 字段语义的显式标签变体（§9 设计提示：避免整数重载）。
/// `AltSecondary` 承载"曾被 ALT 击败"的保留哨兵（原规范中的 max-int）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryStatus {
    Primary,
    DominatedBy(usize),
    AltSecondary,
}

impl SecondaryStatus {
    pub fn as_index(&self) -> i32 {
        match self {
            SecondaryStatus::Primary => -1,
            SecondaryStatus::DominatedBy(i) => *i as i32,
            SecondaryStatus::AltSecondary => i32::MAX,
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, SecondaryStatus::Primary)
    }
}

/// 扩展后的比对候选区域：中心可变记录。
#[derive(Debug, Clone)]
pub struct AlnRegion {
    pub rb: i64,
    pub re: i64,
    pub qb: i32,
    pub qe: i32,
    pub rid: i32,
    /// 局部 SW 最优得分。
    pub score: i32,
    /// 延伸累积后的"真实"得分（sc0 链式记账，§4.4）。
    pub true_score: i32,
    /// 与之重叠的最佳次优得分。
    pub sub: i32,
    /// 近似并列的次优计数。
    pub sub_n: i32,
    /// 最佳 ALT 竞争者得分（若有）。
    pub alt_sc: i32,
    /// 实际使用的带宽。
    pub w: i32,
    /// 被包含种子覆盖的碱基数。
    pub seed_cov: i32,
    /// 锚定种子长度。
    pub seed_len0: i32,
    pub secondary: SecondaryStatus,
    /// Phase-1 排名中的位置（ALT-aware 二级标记，§4.6）。
    pub secondary_all: i32,
    pub hash: u64,
    pub is_alt: bool,
    pub is_rev: bool,
}

impl AlnRegion {
    pub fn query_len(&self) -> i32 {
        self.qe - self.qb
    }

    pub fn ref_len(&self) -> i64 {
        self.re - self.rb
    }

    /// §8 不变量：qb<qe, rb<re。
    pub fn is_well_formed(&self) -> bool {
        self.qb < self.qe && self.rb < self.re
    }
}

/// 一次延伸比对的结果（局部 + 全局两套端点，供 clip-vs-extend 决策用）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwResult {
    pub score: i32,
    /// 局部最优的 query 端点（1-past）。
    pub query_end: i32,
    pub target_end: i32,
    /// 到达 query 末端时的得分（可能低于局部最优）。
    pub global_score: i32,
    pub global_target_end: i32,
    /// 在最高分附近观测到的最大 |i-j|。
    pub max_off: i32,
}

/// CIGAR 操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match,
    Ins,
    Del,
    SoftClip,
    HardClip,
}

impl CigarOp {
    pub fn as_char(&self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Ins => 'I',
            CigarOp::Del => 'D',
            CigarOp::SoftClip => 'S',
            CigarOp::HardClip => 'H',
        }
    }

    pub fn consumes_query(&self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Ins | CigarOp::SoftClip
        )
    }

    pub fn consumes_ref(&self) -> bool {
        matches!(self, CigarOp::Match | CigarOp::Del)
    }
}

pub type Cigar = Vec<(CigarOp, u32)>;

pub fn cigar_to_string(cigar: &Cigar) -> String {
    use std::fmt::Write as _;
    let mut s = String::new();
    for (op, len) in cigar {
        let _ = write!(&mut s, "{}{}", len, op.as_char());
    }
    s
}

/// 带状全局比对（NW）结果。
#[derive(Debug, Clone, Default)]
pub struct GlobalResult {
    pub score: i32,
    pub cigar: Cigar,
}

/// 最终 CIGAR 生成结果（§4.7）。
#[derive(Debug, Clone)]
pub struct CigarResult {
    pub cigar: Cigar,
    pub nm: u32,
    pub md: String,
    /// 可能因前导 deletion 挤压而偏移。
    pub pos: i64,
    pub score: i32,
}

/// 配对方向枚举。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Fr,
    Rf,
    Ff,
    Rr,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Fr,
        Orientation::Rf,
        Orientation::Ff,
        Orientation::Rr,
    ];
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrientationStats {
    pub count: i32,
    pub mean: f64,
    pub stddev: f64,
    pub proper_low: i64,
    pub proper_high: i64,
    pub failed: bool,
}

/// 每个方向的统计量，一次运行只构建一次。
#[derive(Debug, Clone, Default)]
pub struct InsertSizeDistribution {
    pub by_orientation: [OrientationStats; 4],
    pub primary_orientation: Option<Orientation>,
}

impl InsertSizeDistribution {
    pub fn stats(&self, o: Orientation) -> &OrientationStats {
        &self.by_orientation[o as usize]
    }

    pub fn stats_mut(&mut self, o: Orientation) -> &mut OrientationStats {
        &mut self.by_orientation[o as usize]
    }
}

/// 一次配对决策结果（§4.9）。
#[derive(Debug, Clone, Copy)]
pub struct PairDecision {
    pub idx1: usize,
    pub idx2: usize,
    pub score: i32,
    pub second_best_score: i32,
    pub n_sub: i32,
    pub is_proper_pair: bool,
    pub insert_size: i64,
    pub orientation: Orientation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_qend_rend() {
        let s = Seed { rbeg: 10, qbeg: 5, len: 4, score: 4 };
        assert_eq!(s.qend(), 9);
        assert_eq!(s.rend(), 14);
    }

    #[test]
    fn chain_from_seeds_sorts_by_rbeg_and_sets_pos() {
        let seeds = vec![
            Seed { rbeg: 20, qbeg: 10, len: 4, score: 4 },
            Seed { rbeg: 0, qbeg: 0, len: 4, score: 4 },
        ];
        let chain = Chain::from_seeds(seeds, 0, false, false);
        assert_eq!(chain.seeds[0].rbeg, 0);
        assert_eq!(chain.pos, 0);
    }

    #[test]
    fn secondary_status_sentinels() {
        assert_eq!(SecondaryStatus::Primary.as_index(), -1);
        assert_eq!(SecondaryStatus::DominatedBy(3).as_index(), 3);
        assert_eq!(SecondaryStatus::AltSecondary.as_index(), i32::MAX);
        assert!(SecondaryStatus::Primary.is_primary());
        assert!(!SecondaryStatus::AltSecondary.is_primary());
    }

    #[test]
    fn cigar_op_consumption_flags() {
        assert!(CigarOp::Match.consumes_query());
        assert!(CigarOp::Match.consumes_ref());
        assert!(CigarOp::Ins.consumes_query());
        assert!(!CigarOp::Ins.consumes_ref());
        assert!(!CigarOp::Del.consumes_query());
        assert!(CigarOp::Del.consumes_ref());
        assert!(CigarOp::SoftClip.consumes_query());
        assert!(!CigarOp::HardClip.consumes_query());
    }

    #[test]
    fn cigar_to_string_formats_ops() {
        let cigar = vec![(CigarOp::SoftClip, 3), (CigarOp::Match, 10), (CigarOp::Ins, 1)];
        assert_eq!(cigar_to_string(&cigar), "3S10M1I");
    }
}
