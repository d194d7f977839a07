//! Banded global (Needleman–Wunsch) alignment with full backpointer
//! traceback (§4.7). Grounded in the teacher's `align::sw::banded_sw`
//! recurrence, generalized from local (clamped-at-zero) to true global
//! alignment: both ends of `query`/`target` are pinned, row 0 / column 0
//! are seeded with gap-only costs, and every cell keeps a 4-bit backpointer
//! instead of being re-derived by re-scanning the score matrices.

use crate::config::ScoringParams;
use crate::model::{Cigar, CigarOp, GlobalResult};

const NEG_INF: i32 = i32::MIN / 4;

const BIT_E_EXT: u8 = 1 << 0;
const BIT_F_EXT: u8 = 1 << 1;
const BIT_H_FROM_E: u8 = 1 << 2;
const BIT_H_FROM_F: u8 = 1 << 3;

/// §4.7 band-width heuristic: wide enough for the length difference alone
/// when the seed already scored near-perfectly, otherwise widened by an
/// error-budget estimate derived from the score deficit.
pub fn band_width_heuristic(scoring: &ScoringParams, q_len: i32, ref_len: i32, true_score: i32) -> i32 {
    let len_diff = (q_len - ref_len).abs();
    if true_score >= scoring.min_seed_len as i32 * scoring.match_score {
        len_diff + 3
    } else {
        let expected = scoring.expected_score(q_len.max(0) as usize, ref_len.max(0) as usize);
        let deficit = (expected - true_score).max(0);
        let denom = scoring.min_gap_cost().min(scoring.match_mismatch_delta()).max(1);
        let errors = deficit / denom;
        (len_diff + 3).max(errors)
    }
}

/// Run banded NW once at band half-width `w`. Cells outside the band are
/// left at `NEG_INF`, so a score below the caller's target indicates the
/// band was too narrow (§4.7's retry loop doubles `w` and re-runs).
pub fn global_align(query: &[u8], target: &[u8], scoring: &ScoringParams, w: i32) -> GlobalResult {
    let qlen = query.len();
    let tlen = target.len();
    let w = w.max(0);

    if qlen == 0 && tlen == 0 {
        return GlobalResult { score: 0, cigar: Vec::new() };
    }
    if qlen == 0 {
        let score = -(scoring.gap_open_del + scoring.gap_extend_del * tlen as i32);
        return GlobalResult { score, cigar: vec![(CigarOp::Del, tlen as u32)] };
    }
    if tlen == 0 {
        let score = -(scoring.gap_open_ins + scoring.gap_extend_ins * qlen as i32);
        return GlobalResult { score, cigar: vec![(CigarOp::Ins, qlen as u32)] };
    }

    let cols = tlen + 1;
    let rows = qlen + 1;
    let mut h = vec![NEG_INF; rows * cols];
    let mut e = vec![NEG_INF; rows * cols];
    let mut f = vec![NEG_INF; rows * cols];
    let mut bp = vec![0u8; rows * cols];

    h[0] = 0;
    let j_hi0 = tlen.min(w as usize);
    for j in 1..=j_hi0 {
        h[j] = -(scoring.gap_open_del + scoring.gap_extend_del * j as i32);
    }
    let i_hi0 = qlen.min(w as usize);
    for i in 1..=i_hi0 {
        h[i * cols] = -(scoring.gap_open_ins + scoring.gap_extend_ins * i as i32);
    }

    for i in 1..=qlen {
        let ii = i as i32;
        let j_lo = 1usize.max((ii - w).max(0) as usize);
        let j_hi = tlen.min((ii + w) as usize);

        for j in j_lo..=j_hi {
            let idx = i * cols + j;

            let up = h[(i - 1) * cols + j];
            let e_open = up.saturating_sub(scoring.gap_open_ins + scoring.gap_extend_ins);
            let e_ext = e[(i - 1) * cols + j].saturating_sub(scoring.gap_extend_ins);
            let (e_val, e_bit) = if e_ext >= e_open { (e_ext, BIT_E_EXT) } else { (e_open, 0) };
            e[idx] = e_val;

            let left = h[i * cols + (j - 1)];
            let f_open = left.saturating_sub(scoring.gap_open_del + scoring.gap_extend_del);
            let f_ext = f[i * cols + (j - 1)].saturating_sub(scoring.gap_extend_del);
            let (f_val, f_bit) = if f_ext >= f_open { (f_ext, BIT_F_EXT) } else { (f_open, 0) };
            f[idx] = f_val;

            let diag = h[(i - 1) * cols + (j - 1)];
            let subst = if query[i - 1] == target[j - 1] {
                scoring.match_score
            } else {
                -scoring.mismatch_penalty
            };
            let diag_val = diag.saturating_add(subst);

            let mut best = diag_val;
            let mut h_bit = 0u8;
            if e_val > best {
                best = e_val;
                h_bit = BIT_H_FROM_E;
            }
            if f_val > best {
                best = f_val;
                h_bit = BIT_H_FROM_F;
            }
            h[idx] = best;
            bp[idx] = e_bit | f_bit | h_bit;
        }
    }

    let score = h[qlen * cols + tlen];
    let cigar = traceback(&bp, qlen, tlen, cols);
    GlobalResult { score, cigar }
}

/// §4.7's retry loop: double `w` up to 3 times while the result undershoots
/// the seed's accumulated score.
pub fn global_align_with_retry(query: &[u8], target: &[u8], scoring: &ScoringParams, initial_w: i32, true_score: i32) -> GlobalResult {
    let mut w = initial_w.max(1);
    let mut result = global_align(query, target, scoring, w);
    let mut attempts = 0;
    while result.score < true_score && attempts < 3 {
        w *= 2;
        result = global_align(query, target, scoring, w);
        attempts += 1;
    }
    result
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    M,
    E,
    F,
}

/// State machine traceback (§4.7): M inspects bits 2/3 to switch into E/F
/// without moving; E/F emit Ins/Del and only return to M once their
/// extend-bit is unset. `E` tracks query-consuming gaps (teacher's `'I'`
/// branch, derived from the row above); `F` tracks target-consuming gaps
/// (teacher's `'D'` branch, derived from the column to the left) — kept
/// identical to `align::sw::banded_sw`'s axis convention so the CIGAR
/// invariants in §8 (query-consuming length == read length) hold by
/// construction.
fn traceback(bp: &[u8], qlen: usize, tlen: usize, cols: usize) -> Cigar {
    let mut ops: Vec<CigarOp> = Vec::new();
    let mut i = qlen;
    let mut j = tlen;
    let mut state = State::M;

    while i > 0 || j > 0 {
        if i == 0 {
            ops.push(CigarOp::Del);
            j -= 1;
            continue;
        }
        if j == 0 {
            ops.push(CigarOp::Ins);
            i -= 1;
            continue;
        }

        let idx = i * cols + j;
        match state {
            State::M => {
                let b = bp[idx];
                if b & BIT_H_FROM_E != 0 {
                    state = State::E;
                } else if b & BIT_H_FROM_F != 0 {
                    state = State::F;
                } else {
                    ops.push(CigarOp::Match);
                    i -= 1;
                    j -= 1;
                }
            }
            State::E => {
                ops.push(CigarOp::Ins);
                let b = bp[idx];
                i -= 1;
                if b & BIT_E_EXT == 0 {
                    state = State::M;
                }
            }
            State::F => {
                ops.push(CigarOp::Del);
                let b = bp[idx];
                j -= 1;
                if b & BIT_F_EXT == 0 {
                    state = State::M;
                }
            }
        }
    }

    ops.reverse();
    compress(ops)
}

fn compress(ops: Vec<CigarOp>) -> Cigar {
    let mut cigar: Cigar = Vec::new();
    for op in ops {
        match cigar.last_mut() {
            Some((last_op, len)) if *last_op == op => *len += 1,
            _ => cigar.push((op, 1)),
        }
    }
    cigar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna;

    fn scoring() -> ScoringParams {
        ScoringParams::default()
    }

    fn codes(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| dna::encode(b)).collect()
    }

    #[test]
    fn perfect_match_is_single_match_run() {
        let q = codes(b"ACGTACGT");
        let t = codes(b"ACGTACGT");
        let r = global_align(&q, &t, &scoring(), 5);
        assert_eq!(r.cigar, vec![(CigarOp::Match, 8)]);
        assert_eq!(r.score, 8);
    }

    #[test]
    fn single_insertion_detected() {
        let q = codes(b"ACGTGAC");
        let t = codes(b"ACGTAC");
        let r = global_align(&q, &t, &scoring(), 5);
        let ins_len: u32 = r.cigar.iter().filter(|(op, _)| *op == CigarOp::Ins).map(|(_, l)| l).sum();
        assert_eq!(ins_len, 1);
        let query_consumed: u32 = r
            .cigar
            .iter()
            .filter(|(op, _)| op.consumes_query())
            .map(|(_, l)| l)
            .sum();
        assert_eq!(query_consumed, 7);
    }

    #[test]
    fn empty_inputs_score_zero() {
        let r = global_align(&[], &[], &scoring(), 5);
        assert_eq!(r.score, 0);
        assert!(r.cigar.is_empty());
    }

    #[test]
    fn narrow_then_wide_band_agree_on_short_perfect_match() {
        let q = codes(b"ACGT");
        let t = codes(b"ACGT");
        let narrow = global_align(&q, &t, &scoring(), 1);
        let wide = global_align(&q, &t, &scoring(), 8);
        assert_eq!(narrow.score, wide.score);
        assert_eq!(narrow.cigar, wide.cigar);
    }
}
