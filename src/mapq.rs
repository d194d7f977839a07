//! Stage 5: mapping quality (§4.8). A direct port of BWA-MEM's approximate
//! MAPQ estimate: identity and score-margin folded through a log-scaled
//! formula, capped at 60 and penalized for near-tied sub-optimal hits.

use crate::model::AlnRegion;

/// `read_len`/`match_score` give the perfect-score denominator; `regions`
/// is the full candidate set for this read (used only to special-case
/// the zero-region and unique-hit cases). `primary` is the region MAPQ is
/// being computed for.
pub fn compute_mapq(regions: &[AlnRegion], primary: &AlnRegion, read_len: i32, match_score: i32) -> i32 {
    if regions.is_empty() {
        return 0;
    }
    if !primary.secondary.is_primary() {
        return 0;
    }

    let perfect = read_len * match_score;
    if regions.len() == 1 && primary.score == perfect {
        return 60;
    }

    let sub = primary.sub.max(0);
    let score_diff = primary.score - sub;
    if score_diff == 0 || primary.score <= 0 {
        return 0;
    }

    let identity = primary.score as f64 / perfect as f64;
    let raw = 250.0 * (1.0 - sub as f64 / primary.score as f64) * identity * log2(score_diff as f64 + 1.0)
        / log2(perfect as f64 + 1.0);

    let mut mapq = raw.min(60.0);
    if primary.sub_n > 0 {
        mapq -= 4.343 * (1.0 + primary.sub_n as f64).ln();
    }

    mapq.max(0.0).round() as i32
}

fn log2(x: f64) -> f64 {
    x.ln() / std::f64::consts::LN_2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SecondaryStatus;

    fn region(score: i32, sub: i32, sub_n: i32, secondary: SecondaryStatus) -> AlnRegion {
        AlnRegion {
            rb: 0,
            re: 100,
            qb: 0,
            qe: 100,
            rid: 0,
            score,
            true_score: score,
            sub,
            sub_n,
            alt_sc: 0,
            w: 100,
            seed_cov: 0,
            seed_len0: 100,
            secondary,
            secondary_all: -1,
            hash: 0,
            is_alt: false,
            is_rev: false,
        }
    }

    #[test]
    fn no_regions_gives_zero() {
        assert_eq!(compute_mapq(&[], &region(100, 0, 0, SecondaryStatus::Primary), 100, 1), 0);
    }

    #[test]
    fn perfect_unique_hit_is_sixty() {
        let r = region(100, 0, 0, SecondaryStatus::Primary);
        let regions = vec![r.clone()];
        assert_eq!(compute_mapq(&regions, &r, 100, 1), 60);
    }

    #[test]
    fn secondary_region_is_zero() {
        let r = region(90, 0, 0, SecondaryStatus::DominatedBy(0));
        let regions = vec![region(100, 0, 0, SecondaryStatus::Primary), r.clone()];
        assert_eq!(compute_mapq(&regions, &r, 100, 1), 0);
    }

    #[test]
    fn close_competitor_lowers_mapq_below_sixty() {
        let primary = region(100, 96, 1, SecondaryStatus::Primary);
        let regions = vec![primary.clone(), region(96, 0, 0, SecondaryStatus::DominatedBy(0))];
        let mapq = compute_mapq(&regions, &primary, 100, 1);
        assert!(mapq < 60, "mapq={mapq}");
    }

    #[test]
    fn sub_n_penalty_reduces_mapq() {
        let low_subn = region(100, 50, 0, SecondaryStatus::Primary);
        let high_subn = region(100, 50, 5, SecondaryStatus::Primary);
        let regions = vec![low_subn.clone(), region(50, 0, 0, SecondaryStatus::DominatedBy(0))];
        let mapq_low = compute_mapq(&regions, &low_subn, 100, 1);
        let mapq_high = compute_mapq(&regions, &high_subn, 100, 1);
        assert!(mapq_high < mapq_low);
    }
}
