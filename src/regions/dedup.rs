//! Stage 4a: DedupPatch (§4.5). Two passes over regions sorted by
//! `(rid, re)`: drop a region redundant with a more specific overlapping
//! neighbor, or patch-merge two colinear regions across a gap that a
//! single plausible indel explains.

use crate::cigar::global_align;
use crate::config::ScoringParams;
use crate::model::AlnRegion;
use crate::refsource::ReferenceSource;

/// `forward_query`/`revcomp_query` are the read's two strand orientations
/// in the alignment alphabet; a region's `qb`/`qe` index whichever one
/// matches its own `is_rev`.
pub fn dedup_patch(regions: &mut Vec<AlnRegion>, reference: &dyn ReferenceSource, forward_query: &[u8], revcomp_query: &[u8], scoring: &ScoringParams) {
    regions.sort_by_key(|r| (r.rid, r.re));

    let mut deleted = vec![false; regions.len()];

    for i in 0..regions.len() {
        if deleted[i] {
            continue;
        }
        let mut j = i;
        while j > 0 {
            j -= 1;
            if deleted[j] {
                continue;
            }
            if regions[j].rid != regions[i].rid {
                break;
            }
            if regions[i].rb - regions[j].re > scoring.max_chain_gap {
                break;
            }

            if try_redundancy(regions, i, j, scoring) {
                let loser = if regions[i].score >= regions[j].score { j } else { i };
                regions[loser].qe = regions[loser].qb;
                deleted[loser] = true;
                if loser == i {
                    break;
                }
                continue;
            }

            try_patch(regions, i, j, reference, forward_query, revcomp_query, scoring, &mut deleted);
        }
    }

    regions.retain(|r| r.qe > r.qb);
    regions.sort_by(|a, b| b.score.cmp(&a.score));
    dedup_exact(regions);
}

fn try_redundancy(regions: &[AlnRegion], i: usize, j: usize, scoring: &ScoringParams) -> bool {
    let (a, b) = (&regions[i], &regions[j]);

    let ref_overlap = (a.re.min(b.re) - a.rb.max(b.rb)).max(0);
    let min_ref_len = a.ref_len().min(b.ref_len()).max(1);
    let query_overlap = (a.qe.min(b.qe) - a.qb.max(b.qb)).max(0) as i64;
    let min_query_len = a.query_len().min(b.query_len()).max(1) as i64;

    (ref_overlap as f64 / min_ref_len as f64) > scoring.mask_level_redun
        && (query_overlap as f64 / min_query_len as f64) > scoring.mask_level_redun
}

#[allow(clippy::too_many_arguments)]
fn try_patch(
    regions: &mut Vec<AlnRegion>,
    i: usize,
    j: usize,
    reference: &dyn ReferenceSource,
    forward_query: &[u8],
    revcomp_query: &[u8],
    scoring: &ScoringParams,
    deleted: &mut [bool],
) {
    let (a, b) = (&regions[i], &regions[j]);
    if a.is_rev != b.is_rev {
        return;
    }
    // q = leftmost in query, p = rightmost.
    let (qr, pr) = if regions[i].qb <= regions[j].qb {
        (&regions[i], &regions[j])
    } else {
        (&regions[j], &regions[i])
    };

    if !(qr.qb < pr.qb && qr.qe < pr.qe && qr.re < pr.re) {
        return;
    }

    let q_gap = pr.qb - qr.qe;
    let r_gap = pr.rb - qr.re;
    let bw = (q_gap as i64 - r_gap).unsigned_abs() as i32;
    let overlapping = q_gap < 0 || r_gap < 0;
    let denom = (q_gap.unsigned_abs() as i64).max(r_gap.unsigned_abs()).max(1) as f64;
    let rel_bw = bw as f64 / denom;

    let w = scoring.band_width;
    let accepted_shape = if overlapping { bw <= 4 * w && rel_bw < 0.10 } else { bw <= 2 * w && rel_bw < 0.05 };
    if !accepted_shape {
        return;
    }

    let merged_qb = qr.qb;
    let merged_qe = pr.qe;
    let merged_rb = qr.rb;
    let merged_re = pr.re;
    let is_rev = qr.is_rev;

    let query_src = if is_rev { revcomp_query } else { forward_query };
    let query_slice = &query_src[merged_qb as usize..merged_qe as usize];
    let (target_slice, avail) = reference.get_reference(merged_rb, (merged_re - merged_rb) as usize);
    let target_slice = &target_slice[..avail];

    let expected = scoring.expected_score(query_slice.len(), target_slice.len());
    if expected <= 0 {
        return;
    }
    let result = global_align::global_align(query_slice, target_slice, scoring, bw + w);
    if (result.score as f64) / (expected as f64) < 0.90 {
        return;
    }

    let (winner_idx, loser_idx) = if regions[i].qb <= regions[j].qb { (j, i) } else { (i, j) };
    regions[winner_idx].qb = merged_qb;
    regions[winner_idx].qe = merged_qe;
    regions[winner_idx].rb = merged_rb;
    regions[winner_idx].re = merged_re;
    regions[winner_idx].score = result.score;
    regions[winner_idx].true_score = result.score;
    regions[loser_idx].qe = regions[loser_idx].qb;
    deleted[loser_idx] = true;
}

/// Post-pass: two regions with identical `(score, rb, qb)` are the same hit
/// surfaced twice (e.g. by reseeding); keep one.
fn dedup_exact(regions: &mut Vec<AlnRegion>) {
    let mut seen: Vec<(i32, i64, i32)> = Vec::with_capacity(regions.len());
    regions.retain(|r| {
        let key = (r.score, r.rb, r.qb);
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fm::{pack_contigs, FMIndex};
    use crate::model::SecondaryStatus;
    use crate::util::dna;

    fn build_fm(seq: &[u8]) -> FMIndex {
        let (text, contigs) = pack_contigs(&[("chr1".to_string(), seq.to_vec(), false)]);
        FMIndex::build(text, contigs, dna::SIGMA as u8, 4)
    }

    fn region(rb: i64, re: i64, qb: i32, qe: i32, score: i32, rid: i32, is_rev: bool) -> AlnRegion {
        AlnRegion {
            rb,
            re,
            qb,
            qe,
            rid,
            score,
            true_score: score,
            sub: 0,
            sub_n: 0,
            alt_sc: 0,
            w: 100,
            seed_cov: 0,
            seed_len0: qe - qb,
            secondary: SecondaryStatus::Primary,
            secondary_all: -1,
            hash: 0,
            is_alt: false,
            is_rev,
        }
    }

    #[test]
    fn redundant_region_is_dropped() {
        let fm = build_fm(b"ACGTACGTACGTACGTACGTACGT");
        let query = dna::encode_seq(b"ACGTACGTACGTACGTACGTACGT");
        let rc = dna::revcomp_codes(&query);
        let mut regions = vec![region(0, 20, 0, 20, 20, 0, false), region(0, 18, 0, 18, 18, 0, false)];
        let scoring = ScoringParams::default();
        dedup_patch(&mut regions, &fm, &query, &rc, &scoring);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].score, 20);
    }

    #[test]
    fn non_overlapping_distinct_regions_both_survive() {
        let fm = build_fm(b"ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT");
        let query = dna::encode_seq(b"ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT");
        let rc = dna::revcomp_codes(&query);
        let mut regions = vec![region(0, 10, 0, 10, 10, 0, false), region(40, 49, 40, 49, 9, 1, false)];
        let scoring = ScoringParams::default();
        dedup_patch(&mut regions, &fm, &query, &rc, &scoring);
        assert_eq!(regions.len(), 2);
    }
}
