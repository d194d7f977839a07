//! DNA 编码与解码工具。
//!
//! 本 crate 区分两套字母表：
//! - **比对字母表**（2-bit，外部接口 `getReference` 使用）：A=0,C=1,G=2,T=3,N=4。
//! - **BWT 字母表**（FM 索引内部使用，sigma=6）：0 保留为 `$` 分隔符，
//!   其余为比对字母表编码 +1，即 1=A,2=C,3=G,4=T,5=N。
//!
//! 非 ACGT(U) 字符在解析阶段即被强制归一为 N（畸形输入永不导致管线失败）。

/// 比对字母表中的 sigma（不含 BWT 的 `$` 分隔符）。
pub const ALIGN_SIGMA: usize = 5;
/// BWT 字母表的 sigma（含 `$` 分隔符）。
pub const SIGMA: usize = 6;

pub const BASE_A: u8 = 0;
pub const BASE_C: u8 = 1;
pub const BASE_G: u8 = 2;
pub const BASE_T: u8 = 3;
pub const BASE_N: u8 = 4;

/// 将一个 ASCII 碱基编码为比对字母表（0..=4）。非法字符归一为 N。
#[inline]
pub fn encode(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => BASE_A,
        b'C' => BASE_C,
        b'G' => BASE_G,
        b'T' | b'U' => BASE_T,
        _ => BASE_N,
    }
}

/// 比对字母表编码 -> ASCII 碱基。
#[inline]
pub fn decode(code: u8) -> u8 {
    match code {
        BASE_A => b'A',
        BASE_C => b'C',
        BASE_G => b'G',
        BASE_T => b'T',
        _ => b'N',
    }
}

/// 将一段原始 read/reference 字节编码为比对字母表。
pub fn encode_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| encode(b)).collect()
}

/// 比对字母表 -> ASCII 字符串字节。
pub fn decode_seq(codes: &[u8]) -> Vec<u8> {
    codes.iter().map(|&c| decode(c)).collect()
}

/// 比对编码的互补碱基（A<->T, C<->G），N 的互补仍是 N。
#[inline]
pub fn complement_code(code: u8) -> u8 {
    match code {
        BASE_A => BASE_T,
        BASE_T => BASE_A,
        BASE_C => BASE_G,
        BASE_G => BASE_C,
        _ => BASE_N,
    }
}

/// 对一段比对编码序列做反向互补。
pub fn revcomp_codes(codes: &[u8]) -> Vec<u8> {
    codes.iter().rev().map(|&c| complement_code(c)).collect()
}

/// ASCII 碱基归一化：大写化，非 ACGTN 字符映射为 N，U 映射为 T。
/// 用于 FASTA/FASTQ 解析阶段，保证下游只看到 {A,C,G,T,N}。
pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        let up = b.to_ascii_uppercase();
        let nb = match up {
            b'A' | b'C' | b'G' | b'T' | b'N' => up,
            b'U' => b'T',
            _ => b'N',
        };
        out.push(nb);
    }
    out
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        _ => b'N',
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// 比对编码 -> BWT 字母表编码（偏移 1，0 留给 `$`）。
#[inline]
pub fn to_bwt_code(align_code: u8) -> u8 {
    align_code + 1
}

/// BWT 字母表编码 -> 比对编码。调用方需确保不是哨兵（0）。
#[inline]
pub fn from_bwt_code(bwt_code: u8) -> u8 {
    bwt_code - 1
}
