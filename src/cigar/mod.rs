//! Stage 6: CIGARGenerate (§4.7). Turns one extended [`AlnRegion`] into a
//! concrete CIGAR string plus NM/MD, using a fast path for near-perfect
//! equal-length hits and falling back to banded global alignment with a
//! widening-band retry loop otherwise.

pub mod global_align;
pub mod mdnm;

use crate::config::ScoringParams;
use crate::model::{Cigar, CigarOp, CigarResult};

/// `query` is the region's query slice `[qb, qe)` in the chain's strand
/// orientation (alignment alphabet); `target` is the reference slice
/// `[rb, re)`. `read_len`/`qb`/`qe`/`is_rev` feed the soft-clip sizing at
/// the end so the emitted CIGAR always spans the whole original read.
#[allow(clippy::too_many_arguments)]
pub fn generate_cigar(
    query: &[u8],
    target: &[u8],
    scoring: &ScoringParams,
    true_score: i32,
    rb: i64,
    read_len: i32,
    qb: i32,
    qe: i32,
    is_rev: bool,
) -> CigarResult {
    let qlen = query.len() as i32;
    let rlen = target.len() as i32;

    let fast_path_cost = scoring.gap_open_ins + scoring.gap_extend_ins + scoring.gap_open_del + scoring.gap_extend_del;
    let (mut cigar, mut score) = if qlen == rlen && qlen * scoring.match_score - true_score < fast_path_cost {
        (vec![(CigarOp::Match, qlen as u32)], true_score)
    } else {
        let w = global_align::band_width_heuristic(scoring, qlen, rlen, true_score);
        let result = global_align::global_align_with_retry(query, target, scoring, w, true_score);
        (result.cigar, result.score)
    };

    let mut pos = rb;
    let mut target_offset = 0usize;
    squeeze_leading_trailing_deletions(&mut cigar, &mut pos, &mut target_offset);

    if score < true_score {
        score = true_score;
    }

    let ref_slice = &target[target_offset.min(target.len())..];
    let (nm, md) = mdnm::compute_nm_md(&cigar, query, ref_slice);

    append_soft_clips(&mut cigar, read_len, qb, qe, is_rev);

    CigarResult { cigar, nm, md, pos, score }
}

/// §4.7: a purely-deletion leading/trailing run doesn't correspond to any
/// real alignment (the region's endpoints were already anchored by
/// extension); drop it and shift `pos`/the reference offset instead.
fn squeeze_leading_trailing_deletions(cigar: &mut Cigar, pos: &mut i64, target_offset: &mut usize) {
    while let Some(&(CigarOp::Del, len)) = cigar.first() {
        *pos += len as i64;
        *target_offset += len as usize;
        cigar.remove(0);
    }
    while let Some(&(CigarOp::Del, _)) = cigar.last() {
        cigar.pop();
    }
}

fn append_soft_clips(cigar: &mut Cigar, read_len: i32, qb: i32, qe: i32, is_rev: bool) {
    let (lead, trail) = if is_rev { (read_len - qe, qb) } else { (qb, read_len - qe) };

    if trail > 0 {
        cigar.push((CigarOp::SoftClip, trail as u32));
    }
    if lead > 0 {
        cigar.insert(0, (CigarOp::SoftClip, lead as u32));
    }
}
