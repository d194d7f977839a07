//! §4.9 mate rescue: when one mate's normal seeding/chaining never finds
//! the other's true locus, search directly around the expected window
//! derived from the insert-size distribution and a full (wide-banded)
//! local SW, instead of giving up and leaving the mate unmapped.

use crate::config::ScoringParams;
use crate::extend::banded_sw;
use crate::model::{AlnRegion, InsertSizeDistribution, Orientation, SecondaryStatus};
use crate::refsource::ReferenceSource;

use super::insert_size::classify_orientation;

/// Expected mate window `(start, len, mate_is_rev)` in forward BWT-space
/// coordinates, for the hypothesis that `r1`/mate are related by
/// `orientation` with the given mean insert size.
fn expected_mate_window(r1: &AlnRegion, orientation: Orientation, mean: f64, genome_len: i64) -> (i64, usize, bool) {
    let span = (mean * 1.5).ceil() as i64 + 1;

    let (start, end, mate_is_rev) = match orientation {
        Orientation::Fr => {
            if !r1.is_rev {
                (r1.rb, r1.rb + mean as i64 + span, true)
            } else {
                (r1.re - mean as i64 - span, r1.re, false)
            }
        }
        Orientation::Rf => {
            if r1.is_rev {
                (r1.rb, r1.rb + mean as i64 + span, false)
            } else {
                (r1.re - mean as i64 - span, r1.re, true)
            }
        }
        Orientation::Ff | Orientation::Rr => (r1.rb, r1.rb + mean as i64 + span, r1.is_rev),
    };

    let start = start.clamp(0, genome_len);
    let end = end.clamp(0, genome_len);
    if end <= start {
        return (start, 0, mate_is_rev);
    }
    (start, (end - start) as usize, mate_is_rev)
}

/// Try rescuing the unmapped (or weakly-mapped) mate of `r1` by searching
/// every non-failed orientation's expected window and keeping the
/// best-scoring hit above `minSeedLength·matchScore`.
pub fn rescue_mate(
    r1: &AlnRegion,
    rid: i32,
    dist: &InsertSizeDistribution,
    reference: &dyn ReferenceSource,
    forward_query: &[u8],
    revcomp_query: &[u8],
    scoring: &ScoringParams,
) -> Option<AlnRegion> {
    let genome_len = reference.genome_length();
    let mut best: Option<AlnRegion> = None;

    for &orientation in &Orientation::ALL {
        let stats = dist.stats(orientation);
        if stats.failed || stats.stddev <= 0.0 {
            continue;
        }

        let (win_start, win_len, mate_is_rev) = expected_mate_window(r1, orientation, stats.mean, genome_len);
        if win_len == 0 {
            continue;
        }

        let (target, avail) = reference.get_reference(win_start, win_len);
        let target = &target[..avail];
        if target.is_empty() {
            continue;
        }

        let query = if mate_is_rev { revcomp_query } else { forward_query };
        if query.is_empty() {
            continue;
        }

        // Forward pass locates the end of the best local alignment.
        let forward = banded_sw::extend(query, target, scoring, 0, win_len as i32);
        if forward.score < scoring.min_seed_len as i32 * scoring.match_score {
            continue;
        }

        // Reverse pass over the prefixes recovers the true start position,
        // mirroring the left-extension technique used in seed extension.
        let mut q_prefix: Vec<u8> = query[..forward.query_end as usize].to_vec();
        q_prefix.reverse();
        let mut t_prefix: Vec<u8> = target[..forward.target_end as usize].to_vec();
        t_prefix.reverse();
        let reverse = banded_sw::extend(&q_prefix, &t_prefix, scoring, 0, win_len as i32);

        let qb = forward.query_end - reverse.query_end;
        let qe = forward.query_end;
        let rb = win_start + (forward.target_end - reverse.target_end) as i64;
        let re = win_start + forward.target_end as i64;

        if qe <= qb || re <= rb {
            continue;
        }

        let candidate = AlnRegion {
            rb,
            re,
            qb,
            qe,
            rid,
            score: forward.score,
            true_score: forward.score,
            sub: 0,
            sub_n: 0,
            alt_sc: 0,
            w: win_len as i32,
            seed_cov: 0,
            seed_len0: qe - qb,
            secondary: SecondaryStatus::Primary,
            secondary_all: -1,
            hash: 0,
            is_alt: false,
            is_rev: mate_is_rev,
        };

        if best.as_ref().map(|b| candidate.score > b.score).unwrap_or(true) {
            best = Some(candidate);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fm::{pack_contigs, FMIndex};
    use crate::util::dna;

    fn build_fm(seq: &[u8]) -> FMIndex {
        let (text, contigs) = pack_contigs(&[("chr1".to_string(), seq.to_vec(), false)]);
        FMIndex::build(text, contigs, dna::SIGMA as u8, 4)
    }

    fn fr_dist(mean: f64, stddev: f64) -> InsertSizeDistribution {
        let mut dist = InsertSizeDistribution::default();
        let stats = dist.stats_mut(Orientation::Fr);
        stats.mean = mean;
        stats.stddev = stddev;
        stats.count = 30;
        stats.failed = false;
        dist.primary_orientation = Some(Orientation::Fr);
        dist
    }

    #[test]
    fn rescues_mate_at_expected_downstream_window() {
        let reference_seq = {
            let mut s = b"ACGT".repeat(5);
            s.extend_from_slice(b"TTTTTTTTTTTTTTTTTTTT");
            s.extend_from_slice(&dna::revcomp(b"ACGTACGTACGTACGTACGT"));
            s
        };
        let fm = build_fm(&reference_seq);

        let r1 = AlnRegion {
            rb: 0,
            re: 20,
            qb: 0,
            qe: 20,
            rid: 0,
            score: 20,
            true_score: 20,
            sub: 0,
            sub_n: 0,
            alt_sc: 0,
            w: 100,
            seed_cov: 0,
            seed_len0: 20,
            secondary: SecondaryStatus::Primary,
            secondary_all: -1,
            hash: 0,
            is_alt: false,
            is_rev: false,
        };

        let dist = fr_dist(40.0, 5.0);
        let forward_query = dna::encode_seq(b"ACGTACGTACGTACGTACGT");
        let revcomp_query = dna::revcomp_codes(&forward_query);
        let scoring = ScoringParams::default();

        let rescued = rescue_mate(&r1, 0, &dist, &fm, &forward_query, &revcomp_query, &scoring);
        assert!(rescued.is_some());
        let region = rescued.unwrap();
        assert!(region.is_well_formed());
        assert!(region.score >= scoring.min_seed_len as i32 * scoring.match_score);
    }

    #[test]
    fn failed_distribution_yields_no_rescue() {
        let fm = build_fm(b"ACGTACGTACGTACGTACGT");
        let r1 = AlnRegion {
            rb: 0,
            re: 8,
            qb: 0,
            qe: 8,
            rid: 0,
            score: 8,
            true_score: 8,
            sub: 0,
            sub_n: 0,
            alt_sc: 0,
            w: 100,
            seed_cov: 0,
            seed_len0: 8,
            secondary: SecondaryStatus::Primary,
            secondary_all: -1,
            hash: 0,
            is_alt: false,
            is_rev: false,
        };
        let dist = InsertSizeDistribution::default();
        let forward_query = dna::encode_seq(b"ACGTACGT");
        let revcomp_query = dna::revcomp_codes(&forward_query);
        let scoring = ScoringParams::default();
        assert!(rescue_mate(&r1, 0, &dist, &fm, &forward_query, &revcomp_query, &scoring).is_none());
    }
}
