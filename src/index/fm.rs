//! FM 索引：后缀数组 + BWT + Occ 采样，构建在"BWT 空间"（正向+反向互补
//! 拼接、长度 2G）之上（§3）。
//!
//! 采用定长分块的 Occ 采样（块内顺扫补偿），便于后续替换为压缩结构；
//! 保存完整 SA（MVP），方便从区间获得位置；后续可替换为稀疏采样。

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::util::dna;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Contig {
    pub name: String,
    pub len: u32,
    pub offset: u32,
    pub is_alt: bool,
}

/// 索引构建时记录的元信息，供审计/复现使用。由 CLI 的 `index` 子命令填充。
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// 朴素 FM 索引实现：支持任意有限字母表（字母编码 [0..sigma)，0 预留为 `$`）。
#[derive(Debug, Serialize, Deserialize)]
pub struct FMIndex {
    pub sigma: u8,
    pub block: u32,
    /// C[i] = 文本中字母 < i 的累计数量。
    pub c: Vec<u32>,
    /// BWT 序列（与 SA 同长度），覆盖正向+反向互补的拼接文本。
    pub bwt: Vec<u8>,
    /// Occ 采样（按块存储，行优先展平）：occ_samples[block_id * sigma + c]。
    pub occ_samples: Vec<u32>,
    /// 完整 SA（MVP，可换稀疏）。
    pub sa: Vec<u32>,
    /// 正向参考的压缩文本（BWT 字母表编码），长度为 genome_length()。
    /// 用于 getReference 直接切片，而不必每次从 SA/BWT 反推序列。
    pub packed_forward: Vec<u8>,
    /// contig 元信息（名称、长度、正向文本中的起始偏移）。
    pub contigs: Vec<Contig>,
    pub meta: IndexMeta,
}

impl FMIndex {
    /// 从正向参考文本（已含每个 contig 间的 `$` 分隔符）构建整条 FM 索引。
    ///
    /// 内部会镜像生成反向互补文本并与正向文本拼接，构成长度 2G 的 BWT 空间
    /// （见 §3：p∈[0,G) 正向，p∈[G,2G) 编码反向互补位置）。
    pub fn build(
        packed_forward: Vec<u8>,
        contigs: Vec<Contig>,
        sigma: u8,
        block: usize,
    ) -> Self {
        let g = packed_forward.len();
        let mirror = mirror_complement(&packed_forward);

        let mut combined = Vec::with_capacity(g * 2 + 1);
        combined.extend_from_slice(&packed_forward);
        combined.extend_from_slice(&mirror);
        combined.push(0); // 全局终止哨兵，保证后缀数组构建良定义

        let sa = super::sa::build_sa(&combined);
        let bwt = super::bwt::build_bwt(&combined, &sa);

        let n = bwt.len();
        let sigma_us = sigma as usize;
        let mut freq = vec![0u32; sigma_us];
        for &ch in &bwt {
            let ci = ch as usize;
            if ci < sigma_us {
                freq[ci] += 1;
            }
        }
        let mut c = vec![0u32; sigma_us];
        let mut acc = 0u32;
        for i in 0..sigma_us {
            c[i] = acc;
            acc += freq[i];
        }

        let block_u = block as u32;
        let num_blocks = if n == 0 { 0 } else { n.div_ceil(block) };
        let mut occ_samples = vec![0u32; num_blocks * sigma_us];
        let mut running = vec![0u32; sigma_us];
        for bi in 0..num_blocks {
            for a in 0..sigma_us {
                occ_samples[bi * sigma_us + a] = running[a];
            }
            let start = bi * block;
            let end = ((bi + 1) * block).min(n);
            for &ch in &bwt[start..end] {
                let ci = ch as usize;
                if ci < sigma_us {
                    running[ci] += 1;
                }
            }
        }

        Self {
            sigma,
            block: block_u,
            c,
            bwt,
            occ_samples,
            sa,
            packed_forward,
            contigs,
            meta: IndexMeta::default(),
        }
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    #[inline]
    pub fn occ(&self, c: u8, pos: usize) -> u32 {
        if pos == 0 {
            return 0;
        }
        let sigma_us = self.sigma as usize;
        let block = self.block as usize;
        let bi = (pos - 1) / block;
        let base = self.occ_samples[bi * sigma_us + c as usize];
        let start = bi * block;
        let mut add = 0u32;
        for &ch in &self.bwt[start..pos] {
            if ch == c {
                add += 1;
            }
        }
        base + add
    }

    #[inline]
    pub fn rank_range(&self, c: u8, l: usize, r: usize) -> (usize, usize) {
        let c0 = self.c[c as usize] as usize;
        let nl = c0 + self.occ(c, l) as usize;
        let nr = c0 + self.occ(c, r) as usize;
        (nl, nr)
    }

    /// 反向搜索精确匹配；`pat` 为 BWT 字母表编码（不含 0）。
    pub fn backward_search(&self, pat: &[u8]) -> Option<(usize, usize)> {
        if self.bwt.is_empty() {
            return None;
        }
        let mut l = 0usize;
        let mut r = self.bwt.len();
        for &a in pat.iter().rev() {
            let (nl, nr) = self.rank_range(a, l, r);
            if nl >= nr {
                return None;
            }
            l = nl;
            r = nr;
        }
        Some((l, r))
    }

    /// 在已有区间基础上向左扩展一个字符（逐字符增量 backward search）。
    pub fn extend_left(&self, a: u8, l: usize, r: usize) -> Option<(usize, usize)> {
        let (nl, nr) = self.rank_range(a, l, r);
        if nl >= nr {
            None
        } else {
            Some((nl, nr))
        }
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), Error> {
        let mut f = std::fs::File::create(path).map_err(Error::Io)?;
        bincode::serialize_into(&mut f, self).map_err(|e| Error::SaveIndex {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn load_from_file(path: &std::path::Path) -> Result<Self, Error> {
        let f = std::fs::File::open(path).map_err(Error::Io)?;
        bincode::deserialize_from(f).map_err(|e| Error::LoadIndex {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// 取出 SA 区间对应的文本位置（MVP：直接从完整 SA 返回）。
    pub fn sa_interval_positions(&self, l: usize, r: usize) -> &[u32] {
        &self.sa[l..r]
    }

    /// BWT 空间半长 G：正向压缩文本（含 contig 间 `$`）的长度。
    pub fn genome_length(&self) -> i64 {
        self.packed_forward.len() as i64
    }

    /// 将正向坐标空间内的位置映射到 (contig_index, contig_offset)。
    /// 要求 `pos` 已经落在 [0, G) 内；落在分隔符（`$`）位置返回 None。
    pub fn decode_position(&self, pos: i64) -> Option<(usize, u32)> {
        if pos < 0 || self.contigs.is_empty() {
            return None;
        }
        let pos = pos as u32;
        let mut lo = 0usize;
        let mut hi = self.contigs.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let c = &self.contigs[mid];
            if pos < c.offset {
                hi = mid;
            } else if pos >= c.offset + c.len {
                lo = mid + 1;
            } else {
                return Some((mid, pos - c.offset));
            }
        }
        None
    }

    pub fn sequence_id(&self, pos: i64) -> i32 {
        self.decode_position(pos).map(|(i, _)| i as i32).unwrap_or(-1)
    }

    /// §6：getReference — 取出比对字母表（0..=4）编码的参考碱基切片。
    /// `pos` 在 BWT 空间 [0, 2G) 内；`pos>=G` 时返回镜像窗口的反向互补片段。
    /// 超出有效范围时截断到实际可用部分，返回实际长度。
    pub fn get_reference(&self, pos: i64, len: usize) -> (Vec<u8>, usize) {
        let g = self.genome_length();
        if pos < 0 || len == 0 {
            return (Vec::new(), 0);
        }
        if pos < g {
            let start = pos as usize;
            let avail = self.packed_forward.len().saturating_sub(start);
            let take = len.min(avail);
            let slice = &self.packed_forward[start..start + take];
            let decoded: Vec<u8> = slice
                .iter()
                .map(|&c| if c == 0 { dna::BASE_N } else { dna::from_bwt_code(c) })
                .collect();
            (decoded, take)
        } else {
            // 镜像窗口：正向坐标 fwd = 2G-1-pos 对应镜像序列里该位置。
            // 向右取 len 个碱基等价于沿镜像方向继续前进。
            let two_g = 2 * g;
            if pos >= two_g {
                return (Vec::new(), 0);
            }
            let mirror_idx = (pos - g) as usize;
            let avail = self.packed_forward.len().saturating_sub(mirror_idx);
            let take = len.min(avail);
            let mirror = mirror_complement(&self.packed_forward);
            let slice = &mirror[mirror_idx..mirror_idx + take];
            let decoded: Vec<u8> = slice
                .iter()
                .map(|&c| if c == 0 { dna::BASE_N } else { dna::from_bwt_code(c) })
                .collect();
            (decoded, take)
        }
    }
}

/// 对整条正向压缩文本取反向互补（保留 `$` 哨兵在原位，仅整体颠倒顺序）。
fn mirror_complement(packed_forward: &[u8]) -> Vec<u8> {
    packed_forward
        .iter()
        .rev()
        .map(|&c| {
            if c == 0 {
                0
            } else {
                dna::to_bwt_code(dna::complement_code(dna::from_bwt_code(c)))
            }
        })
        .collect()
}

/// 从一批 contig 的 ASCII 序列构建正向压缩文本 + contig 元信息。
/// 每个 contig 后附加一个 `$` 哨兵（BWT 字母表编码 0）。
pub fn pack_contigs(records: &[(String, Vec<u8>, bool)]) -> (Vec<u8>, Vec<Contig>) {
    let mut text = Vec::new();
    let mut contigs = Vec::with_capacity(records.len());
    for (name, seq, is_alt) in records {
        let start = text.len() as u32;
        let norm = dna::normalize_seq(seq);
        for b in norm {
            text.push(dna::to_bwt_code(dna::encode(b)));
        }
        let len = (text.len() as u32).saturating_sub(start);
        contigs.push(Contig {
            name: name.clone(),
            len,
            offset: start,
            is_alt: *is_alt,
        });
        text.push(0);
    }
    (text, contigs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_test_fm(seq: &[u8]) -> FMIndex {
        let (text, contigs) = pack_contigs(&[("chr1".to_string(), seq.to_vec(), false)]);
        FMIndex::build(text, contigs, dna::SIGMA as u8, 4)
    }

    #[test]
    fn backward_search_finds_exact_match() {
        let fm = build_test_fm(b"ACGTACGT");
        let pat: Vec<u8> = b"CGTA".iter().map(|&b| dna::to_bwt_code(dna::encode(b))).collect();
        let res = fm.backward_search(&pat);
        assert!(res.is_some());
        let (l, r) = res.unwrap();
        assert!(r > l);
    }

    #[test]
    fn decode_position_roundtrips_within_contig() {
        let fm = build_test_fm(b"ACGTACGT");
        let (ci, off) = fm.decode_position(3).unwrap();
        assert_eq!(ci, 0);
        assert_eq!(off, 3);
    }

    #[test]
    fn decode_position_rejects_sentinel_gap() {
        let (text, contigs) = pack_contigs(&[
            ("c1".to_string(), b"ACGT".to_vec(), false),
            ("c2".to_string(), b"TTTT".to_vec(), false),
        ]);
        let fm = FMIndex::build(text, contigs, dna::SIGMA as u8, 4);
        // position 4 is the sentinel between c1 and c2
        assert!(fm.decode_position(4).is_none());
        let (ci, off) = fm.decode_position(5).unwrap();
        assert_eq!(ci, 1);
        assert_eq!(off, 0);
    }

    #[test]
    fn get_reference_forward_matches_packed_text() {
        let fm = build_test_fm(b"ACGT");
        let (bases, n) = fm.get_reference(0, 4);
        assert_eq!(n, 4);
        assert_eq!(dna::decode_seq(&bases), b"ACGT");
    }

    #[test]
    fn get_reference_reverse_strand_is_revcomp_of_forward() {
        // "AACG" is not self-revcomp-palindromic, unlike "ACGT".
        let fm = build_test_fm(b"AACG");
        let g = fm.genome_length();
        // mirror[0] is the sentinel inherited from the forward text's tail;
        // skip it so the window lines up with real bases.
        let (bases, n) = fm.get_reference(g + 1, 4);
        assert_eq!(n, 4);
        assert_eq!(dna::decode_seq(&bases), dna::revcomp(b"AACG"));
    }

    #[test]
    fn get_reference_truncates_out_of_range() {
        let fm = build_test_fm(b"ACGT");
        let (_, n) = fm.get_reference(2, 100);
        assert!(n <= 4);
    }

    #[test]
    fn genome_length_matches_packed_forward_len() {
        let fm = build_test_fm(b"ACGTACGT");
        assert_eq!(fm.genome_length(), fm.packed_forward.len() as i64);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let mut fm = build_test_fm(b"ACGTACGT");
        fm.set_meta(IndexMeta {
            reference_file: Some("ref.fa".to_string()),
            build_args: Some("index ref.fa".to_string()),
            build_timestamp: Some("2026-07-28T00:00:00Z".to_string()),
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.fm");
        fm.save_to_file(&path).unwrap();
        let loaded = FMIndex::load_from_file(&path).unwrap();
        assert_eq!(loaded.bwt, fm.bwt);
        assert_eq!(loaded.sa, fm.sa);
        assert_eq!(loaded.contigs.len(), fm.contigs.len());
        assert_eq!(loaded.meta.reference_file, fm.meta.reference_file);
    }
}
