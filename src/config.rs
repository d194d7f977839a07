//! 配置项：比对评分参数、标志位与运行时选项（§6）。
//!
//! 默认值取自 BWA-MEM 已发布的默认参数，供差异化测试对照。

/// 评分与启发式阈值参数，在整条流水线中以不可变引用传递（§3：Ownership）。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringParams {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    pub gap_open_ins: i32,
    pub gap_extend_ins: i32,
    pub gap_open_del: i32,
    pub gap_extend_del: i32,
    pub pen_clip5: i32,
    pub pen_clip3: i32,
    pub unpaired_penalty: i32,
    pub band_width: i32,
    pub z_drop: i32,
    pub min_seed_len: usize,
    pub max_occurrences: usize,
    pub reseed_length: usize,
    pub seed_split_ratio: f64,
    pub split_width: usize,
    pub min_output_score: i32,
    pub max_chain_gap: i64,
    pub min_chain_weight: i32,
    pub chain_drop_ratio: f64,
    pub mask_level: f64,
    pub mask_level_redun: f64,
    pub max_mate_sw: usize,
    pub max_xa_hits: usize,
    pub max_xa_hits_alt: usize,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            match_score: 1,
            mismatch_penalty: 4,
            gap_open_ins: 6,
            gap_extend_ins: 1,
            gap_open_del: 6,
            gap_extend_del: 1,
            pen_clip5: 5,
            pen_clip3: 5,
            unpaired_penalty: 17,
            band_width: 100,
            z_drop: 100,
            min_seed_len: 19,
            max_occurrences: 50,
            reseed_length: 28, // unused directly; seed_split_ratio drives reseeding
            seed_split_ratio: 0.5,
            split_width: 10,
            min_output_score: 30,
            max_chain_gap: 10_000,
            min_chain_weight: 0,
            chain_drop_ratio: 0.5,
            mask_level: 0.5,
            mask_level_redun: 0.95,
            max_mate_sw: 20,
            max_xa_hits: 5,
            max_xa_hits_alt: 200,
        }
    }
}

impl ScoringParams {
    /// 期望得分：理想情况下整条 read/参考窗口都能匹配时的得分。用于
    /// CIGAR 带宽推断（§4.7）与 DedupPatch 的合并接受阈值（§4.5）。
    pub fn expected_score(&self, q_len: usize, ref_len: usize) -> i32 {
        let max_len = q_len.max(ref_len) as i32;
        let len_diff = (q_len as i32 - ref_len as i32).unsigned_abs() as i32;
        max_len * self.match_score - self.gap_open_del - self.gap_extend_del * len_diff
    }

    /// 错配/空位带来的单位代价下限，用于带宽推断中的 errors 估计。
    pub fn match_mismatch_delta(&self) -> i32 {
        self.match_score + self.mismatch_penalty
    }

    pub fn min_gap_cost(&self) -> i32 {
        (self.gap_open_ins + self.gap_extend_ins).min(self.gap_open_del + self.gap_extend_del)
    }
}

/// §6 标志位。以裸 `u32` 常量实现，而非引入 `bitflags` crate —— 与教师仓库
/// 保持一致的极简依赖取向，且位数很少，常量组合已经足够清晰。
pub mod flag_bits {
    pub const NO_MULTI: u32 = 0x01;
    pub const SOFT_CLIP: u32 = 0x02;
    pub const PRIMARY5: u32 = 0x04;
    pub const KEEP_SUPP_MAPQ: u32 = 0x08;
    pub const NO_RESCUE: u32 = 0x10;
    pub const NO_PAIRING: u32 = 0x20;
    pub const NO_ALT: u32 = 0x40;
    pub const ALL: u32 = 0x80;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunConfig {
    pub scoring: ScoringParams,
    pub flags: u32,
    pub num_threads: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringParams::default(),
            flags: 0,
            num_threads: 1,
        }
    }
}

impl RunConfig {
    #[inline]
    pub fn has_flag(&self, bit: u32) -> bool {
        self.flags & bit != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scoring_matches_bwa_mem_defaults() {
        let p = ScoringParams::default();
        assert_eq!(p.match_score, 1);
        assert_eq!(p.mismatch_penalty, 4);
        assert_eq!(p.gap_open_ins, 6);
        assert_eq!(p.pen_clip5, 5);
    }

    #[test]
    fn flag_bits_are_distinct_and_composable() {
        let cfg = RunConfig {
            flags: flag_bits::NO_MULTI | flag_bits::ALL,
            ..RunConfig::default()
        };
        assert!(cfg.has_flag(flag_bits::NO_MULTI));
        assert!(cfg.has_flag(flag_bits::ALL));
        assert!(!cfg.has_flag(flag_bits::NO_RESCUE));
    }
}
