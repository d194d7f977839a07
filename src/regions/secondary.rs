//! Stage 4b: SecondaryMark (§4.6). Ranks regions by score (ties broken by
//! a stable hash so repeated runs produce identical output) and marks any
//! region whose query span is mostly covered by a higher-ranked region as
//! secondary. ALT contigs get a second pass: a region dominated only by
//! an ALT primary is tagged [`SecondaryStatus::AltSecondary`] instead of
//! an ordinary [`SecondaryStatus::DominatedBy`], so MAPQ / `XA` bookkeeping
//! downstream can tell "multi-mapped for real" apart from "also present on
//! a known ALT locus".

use crate::config::ScoringParams;
use crate::model::{AlnRegion, SecondaryStatus};

pub fn mark_secondary(regions: &mut [AlnRegion], scoring: &ScoringParams) {
    let mut order: Vec<usize> = (0..regions.len()).collect();
    order.sort_by(|&a, &b| {
        regions[b]
            .score
            .cmp(&regions[a].score)
            .then(regions[a].hash.cmp(&regions[b].hash))
    });

    for r in regions.iter_mut() {
        r.secondary = SecondaryStatus::Primary;
    }

    // Phase 1: rank the non-ALT regions against each other.
    let mut kept_primary_non_alt: Vec<usize> = Vec::new();
    for &idx in &order {
        if regions[idx].is_alt {
            continue;
        }
        if let Some(&dominator) = kept_primary_non_alt
            .iter()
            .find(|&&p| query_overlap_ratio(&regions[p], &regions[idx]) > scoring.mask_level)
        {
            regions[idx].secondary = SecondaryStatus::DominatedBy(dominator);
        } else {
            kept_primary_non_alt.push(idx);
        }
    }

    // Phase 2: rank ALT regions, first against non-ALT primaries (tagged
    // AltSecondary rather than counted as ordinary multi-mapping), then
    // against each other in score order.
    let mut kept_alt: Vec<usize> = Vec::new();
    for &idx in &order {
        if !regions[idx].is_alt {
            continue;
        }
        if kept_primary_non_alt
            .iter()
            .any(|&p| query_overlap_ratio(&regions[p], &regions[idx]) > scoring.mask_level)
        {
            regions[idx].secondary = SecondaryStatus::AltSecondary;
            continue;
        }
        if let Some(&dominator) = kept_alt
            .iter()
            .find(|&&p| query_overlap_ratio(&regions[p], &regions[idx]) > scoring.mask_level)
        {
            regions[idx].secondary = SecondaryStatus::DominatedBy(dominator);
        } else {
            kept_alt.push(idx);
        }
    }
}

fn query_overlap_ratio(a: &AlnRegion, b: &AlnRegion) -> f64 {
    let overlap = (a.qe.min(b.qe) - a.qb.max(b.qb)).max(0) as f64;
    let min_len = a.query_len().min(b.query_len()).max(1) as f64;
    overlap / min_len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(qb: i32, qe: i32, score: i32, is_alt: bool, hash: u64) -> AlnRegion {
        AlnRegion {
            rb: 0,
            re: (qe - qb) as i64,
            qb,
            qe,
            rid: 0,
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
            hash,
            is_alt,
            is_rev: false,
        }
    }

    #[test]
    fn lower_scoring_overlapping_region_becomes_secondary() {
        let mut regions = vec![region(0, 100, 100, false, 1), region(5, 95, 90, false, 2)];
        mark_secondary(&mut regions, &ScoringParams::default());
        assert!(regions[0].secondary.is_primary());
        assert!(matches!(regions[1].secondary, SecondaryStatus::DominatedBy(0)));
    }

    #[test]
    fn non_overlapping_regions_both_stay_primary() {
        let mut regions = vec![region(0, 50, 50, false, 1), region(100, 150, 50, false, 2)];
        mark_secondary(&mut regions, &ScoringParams::default());
        assert!(regions[0].secondary.is_primary());
        assert!(regions[1].secondary.is_primary());
    }

    #[test]
    fn alt_region_dominated_by_primary_gets_alt_secondary_sentinel() {
        let mut regions = vec![region(0, 100, 100, false, 1), region(0, 100, 80, true, 2)];
        mark_secondary(&mut regions, &ScoringParams::default());
        assert!(regions[0].secondary.is_primary());
        assert!(matches!(regions[1].secondary, SecondaryStatus::AltSecondary));
    }

    #[test]
    fn tie_score_broken_by_hash() {
        let mut regions = vec![region(0, 100, 100, false, 5), region(0, 100, 100, false, 1)];
        mark_secondary(&mut regions, &ScoringParams::default());
        // Lower hash sorts first and becomes the kept primary.
        assert!(regions[1].secondary.is_primary());
        assert!(matches!(regions[0].secondary, SecondaryStatus::DominatedBy(1)));
    }
}
