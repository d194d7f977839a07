//! Tiered banded extension (§4.4): Farrar-style striped SIMD is replaced by
//! three safe-Rust scalar tiers sharing one recurrence, since the crate
//! carries `#![forbid(unsafe_code)]` (kept from the teacher's own lint
//! config) and no nightly `std::simd` dependency exists anywhere in the
//! retrieval pack. The 8-bit tier signals overflow by returning `None`
//! exactly like real striped SW signals saturation; callers fall back to
//! 16-bit, then to an unlimited scalar pass. All three tiers must agree on
//! non-overflowing inputs (§8) because they run the identical recurrence —
//! only the overflow ceiling changes.

use crate::config::ScoringParams;
use crate::model::SwResult;

const NEG_INF: i32 = i32::MIN / 4;

const TIER_8BIT_MAX: i32 = 250;
const TIER_16BIT_MAX: i32 = 32_000;

/// Extend query[0..] against target[0..] starting from score `h0`, banded to
/// `±band_width` around the main diagonal. Both slices are already oriented
/// (reversed for a left extension) so position 0 sits at the seed boundary.
pub fn extend(query: &[u8], target: &[u8], scoring: &ScoringParams, h0: i32, band_width: i32) -> SwResult {
    if let Some(r) = extend_tier(query, target, scoring, h0, band_width, Some(TIER_8BIT_MAX)) {
        return r;
    }
    if let Some(r) = extend_tier(query, target, scoring, h0, band_width, Some(TIER_16BIT_MAX)) {
        return r;
    }
    extend_tier(query, target, scoring, h0, band_width, None).expect("scalar tier never overflows")
}

/// One recurrence pass, capped at `score_limit` (`None` = unbounded scalar
/// reference tier). Returns `None` if any intermediate H exceeds the cap.
fn extend_tier(
    query: &[u8],
    target: &[u8],
    scoring: &ScoringParams,
    h0: i32,
    band_width: i32,
    score_limit: Option<i32>,
) -> Option<SwResult> {
    let qlen = query.len();
    let tlen = target.len();

    if qlen == 0 || tlen == 0 {
        return Some(SwResult {
            score: h0.max(0),
            query_end: 0,
            target_end: 0,
            global_score: h0.max(0),
            global_target_end: 0,
            max_off: 0,
        });
    }

    let cols = tlen + 1;
    let mut h_prev = vec![NEG_INF; cols];
    let mut h_cur = vec![NEG_INF; cols];
    let mut e_prev = vec![NEG_INF; cols];
    let mut e_cur = vec![NEG_INF; cols];
    let mut f_cur = vec![NEG_INF; cols];

    h_prev[0] = h0;
    check_limit(h0, score_limit)?;

    let mut best_score = h0;
    let mut best_i = 0usize;
    let mut best_j = 0usize;
    let mut best_max_off = 0i32;

    let mut global_score = h0;
    let mut global_target_end = 0usize;

    for i in 1..=qlen {
        let ii = i as i32;
        let j_lo = 1usize.max((ii - band_width).max(0) as usize);
        let j_hi = tlen.min((ii + band_width) as usize);

        for v in h_cur.iter_mut() {
            *v = NEG_INF;
        }
        for v in e_cur.iter_mut() {
            *v = NEG_INF;
        }
        for v in f_cur.iter_mut() {
            *v = NEG_INF;
        }

        let mut row_max = NEG_INF;
        let mut row_max_j = j_lo;

        for j in j_lo..=j_hi {
            let up = h_prev[j];
            let e_open = up.saturating_sub(scoring.gap_open_ins + scoring.gap_extend_ins);
            let e_ext = e_prev[j].saturating_sub(scoring.gap_extend_ins);
            let e_val = e_open.max(e_ext);
            e_cur[j] = e_val;

            let left_h = h_cur[j - 1];
            let left_f = f_cur[j - 1];
            let f_open = left_h.saturating_sub(scoring.gap_open_del + scoring.gap_extend_del);
            let f_ext = left_f.saturating_sub(scoring.gap_extend_del);
            let f_val = f_open.max(f_ext);
            f_cur[j] = f_val;

            let diag = h_prev[j - 1];
            let subst = if query[i - 1] == target[j - 1] {
                scoring.match_score
            } else {
                -scoring.mismatch_penalty
            };
            // Diagonal restart prevention (§4.4): a zero incoming H must not
            // seed a fresh local alignment through the diagonal term.
            let diag_term = if diag == 0 { NEG_INF } else { diag + subst };

            let mut val = diag_term;
            if e_val > val {
                val = e_val;
            }
            if f_val > val {
                val = f_val;
            }
            h_cur[j] = val;

            check_limit(val, score_limit)?;

            if val > row_max {
                row_max = val;
                row_max_j = j;
            }
        }

        if row_max > best_score {
            best_score = row_max;
            best_i = i;
            best_j = row_max_j;
            best_max_off = (i as i32 - row_max_j as i32).abs();
        } else if row_max > NEG_INF {
            let off = (i as i32 - row_max_j as i32).abs();
            if row_max == best_score && off > best_max_off {
                best_max_off = off;
            }
        }

        if i == qlen {
            for j in j_lo..=j_hi {
                if h_cur[j] > global_score {
                    global_score = h_cur[j];
                    global_target_end = j;
                }
            }
        }

        if z_drop_triggered(scoring, best_score, best_i, best_j, i, row_max, row_max_j) {
            break;
        }

        std::mem::swap(&mut h_prev, &mut h_cur);
        std::mem::swap(&mut e_prev, &mut e_cur);
    }

    Some(SwResult {
        score: best_score.max(0),
        query_end: best_i as i32,
        target_end: best_j as i32,
        global_score: global_score.max(0),
        global_target_end: global_target_end as i32,
        max_off: best_max_off,
    })
}

#[inline]
fn check_limit(val: i32, limit: Option<i32>) -> Option<()> {
    match limit {
        Some(max) if val > max => None,
        _ => Some(()),
    }
}

/// §4.4 z-dropoff: once the running row max falls behind the global max by
/// more than the gap-adjusted threshold, stop extending.
fn z_drop_triggered(
    scoring: &ScoringParams,
    max_score: i32,
    max_i: usize,
    max_j: usize,
    i: usize,
    row_max: i32,
    row_max_j: usize,
) -> bool {
    if row_max <= NEG_INF / 2 {
        return false;
    }
    if row_max >= max_score {
        return false;
    }
    let delta_i = (i as i32 - max_i as i32).max(0);
    let delta_j = (row_max_j as i32 - max_j as i32).max(0);
    if delta_i > delta_j {
        max_score - row_max - (delta_i - delta_j) * scoring.gap_extend_del > scoring.z_drop
    } else {
        max_score - row_max - (delta_j - delta_i) * scoring.gap_extend_ins > scoring.z_drop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_scoring() -> ScoringParams {
        ScoringParams::default()
    }

    #[test]
    fn perfect_extension_matches_full_length() {
        let scoring = default_scoring();
        let q = vec![0u8, 1, 2, 3];
        let t = vec![0u8, 1, 2, 3];
        let r = extend(&q, &t, &scoring, 0, 10);
        assert_eq!(r.score, 4);
        assert_eq!(r.query_end, 4);
        assert_eq!(r.target_end, 4);
    }

    #[test]
    fn empty_inputs_return_neutral_result() {
        let scoring = default_scoring();
        let r = extend(&[], &[1, 2, 3], &scoring, 5, 10);
        assert_eq!(r.query_end, 0);
        assert_eq!(r.target_end, 0);
        assert_eq!(r.score, 5);
    }

    #[test]
    fn z_dropoff_terminates_after_run_of_mismatches() {
        let mut scoring = default_scoring();
        scoring.z_drop = 10;
        let mut q = vec![0u8; 5];
        q.extend(std::iter::repeat(0u8).take(100));
        let mut t = vec![0u8, 1, 2, 3, 0];
        t.extend(std::iter::repeat(3u8).take(100));
        let r = extend(&q, &t, &scoring, 0, 5);
        assert!(r.target_end < 50, "target_end={}", r.target_end);
    }

    #[test]
    fn all_mismatch_gives_no_positive_result() {
        let scoring = default_scoring();
        let q = vec![0u8; 4];
        let t = vec![1u8; 4];
        let r = extend(&q, &t, &scoring, 0, 4);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn eight_bit_tier_falls_back_on_overflow() {
        let scoring = default_scoring();
        let q = vec![0u8; 300];
        let t = vec![0u8; 300];
        let r = extend(&q, &t, &scoring, 0, 400);
        assert_eq!(r.score, 300);
    }
}
