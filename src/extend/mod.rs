//! Stage 3: ExtensionAligner (§4.4). Extends each seed of a filtered chain
//! left and right with the tiered banded SW in [`banded_sw`], folding
//! same-chain seeds that already fall inside an extended region into that
//! region's `sub`/`sub_n` bookkeeping instead of re-extending them.

pub mod banded_sw;

use crate::config::ScoringParams;
use crate::model::{AlnRegion, Chain, SecondaryStatus, Seed};
use crate::refsource::ReferenceSource;
use crate::util::dna;

/// A same-chain seed within this many points of a covering region's score is
/// still counted toward that region's near-tie `sub_n` (§4.4). BWA-MEM does
/// not name this constant; the single affine gap-open+extend cost is the
/// natural "one indel event" scale, so it is used here (documented as an
/// Open Question resolution in DESIGN.md).
fn max_single_event_penalty(scoring: &ScoringParams) -> i32 {
    (scoring.gap_open_ins + scoring.gap_extend_ins).max(scoring.gap_open_del + scoring.gap_extend_del)
}

const RIGHT_EXTENSION_CAP: i64 = 10_000;

/// Extend every seed of one chain. `oriented_query` must already be in the
/// chain's strand (reverse-complemented by the caller when `chain.is_rev`).
pub fn extend_chain(
    reference: &dyn ReferenceSource,
    chain: &Chain,
    oriented_query: &[u8],
    scoring: &ScoringParams,
) -> Vec<AlnRegion> {
    let mut regions: Vec<AlnRegion> = Vec::new();
    let qlen = oriented_query.len() as i32;
    let max_event_penalty = max_single_event_penalty(scoring);

    for seed in &chain.seeds {
        if let Some(covering) = regions
            .iter_mut()
            .find(|r| r.qb <= seed.qbeg && seed.qend() <= r.qe)
        {
            let seed_score = seed.len * scoring.match_score;
            covering.sub = covering.sub.max(seed_score);
            if seed_score >= covering.score - max_event_penalty {
                covering.sub_n += 1;
            }
            continue;
        }

        let region = extend_one_seed(reference, chain, seed, oriented_query, scoring, qlen);
        regions.push(region);
    }

    for region in regions.iter_mut() {
        region.seed_cov = chain
            .seeds
            .iter()
            .filter(|s| region.qb <= s.qbeg && s.qend() <= region.qe && region.rb <= s.rbeg && s.rend() <= region.re)
            .map(|s| s.len)
            .sum();

        if region.sub > 0 && region.sub < scoring.min_seed_len as i32 * scoring.match_score {
            region.sub = 0;
        }
    }

    regions
}

fn extend_one_seed(
    reference: &dyn ReferenceSource,
    chain: &Chain,
    seed: &Seed,
    oriented_query: &[u8],
    scoring: &ScoringParams,
    qlen: i32,
) -> AlnRegion {
    let mut left_q_len = 0i32;
    let mut left_t_len = 0i64;
    let mut accumulated_h0 = seed.score;

    if seed.qbeg > 0 {
        let l = (seed.qbeg as i64 + scoring.band_width as i64).min(seed.rbeg);
        if l > 0 {
            let mut q_prefix: Vec<u8> = oriented_query[..seed.qbeg as usize].to_vec();
            q_prefix.reverse();
            let (mut t_prefix, t_avail) = reference.get_reference(seed.rbeg - l, l as usize);
            t_prefix.truncate(t_avail);
            t_prefix.reverse();

            let result = banded_sw::extend(&q_prefix, &t_prefix, scoring, seed.score, scoring.band_width);
            let take_global = result.global_score > 0 && result.global_score > result.score - scoring.pen_clip5;

            if take_global {
                left_q_len = result.global_target_end.min(q_prefix.len() as i32);
                left_t_len = result.global_target_end as i64;
                accumulated_h0 = result.global_score;
            } else {
                left_q_len = result.query_end;
                left_t_len = result.target_end as i64;
                accumulated_h0 = result.score;
            }
        }
    }

    let mut right_q_len = 0i32;
    let mut right_t_len = 0i64;
    let mut right_chosen: Option<i32> = None;

    let remaining_query = qlen - seed.qend();
    if remaining_query > 0 {
        let r = (remaining_query as i64 + scoring.band_width as i64).min(RIGHT_EXTENSION_CAP);
        if r > 0 {
            let q_suffix = &oriented_query[seed.qend() as usize..];
            let (t_suffix, t_avail) = reference.get_reference(seed.rend(), r as usize);
            let t_suffix = &t_suffix[..t_avail];

            let result = banded_sw::extend(q_suffix, t_suffix, scoring, accumulated_h0, scoring.band_width);
            let take_global = result.global_score > 0 && result.global_score > result.score - scoring.pen_clip3;

            if take_global {
                right_q_len = result.global_target_end.min(q_suffix.len() as i32);
                right_t_len = result.global_target_end as i64;
                right_chosen = Some(result.global_score);
            } else {
                right_q_len = result.query_end;
                right_t_len = result.target_end as i64;
                right_chosen = Some(result.score);
            }
        }
    }

    let mut true_score = seed.len * scoring.match_score;
    if accumulated_h0 > 0 {
        true_score = accumulated_h0;
    }
    if let Some(rc) = right_chosen {
        if rc > 0 {
            true_score += rc - accumulated_h0;
        }
    }

    let qb = seed.qbeg - left_q_len;
    let qe = seed.qend() + right_q_len;
    let rb = seed.rbeg - left_t_len;
    let re = seed.rend() + right_t_len;

    AlnRegion {
        rb,
        re,
        qb,
        qe,
        rid: chain.rid,
        score: right_chosen.unwrap_or(accumulated_h0).max(seed.score),
        true_score,
        sub: 0,
        sub_n: 0,
        alt_sc: 0,
        w: scoring.band_width,
        seed_cov: 0,
        seed_len0: seed.len,
        secondary: SecondaryStatus::Primary,
        secondary_all: -1,
        hash: 0,
        is_alt: chain.is_alt,
        is_rev: chain.is_rev,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fm::{pack_contigs, FMIndex};
    use crate::model::Chain;

    fn build_fm(seq: &[u8]) -> FMIndex {
        let (text, contigs) = pack_contigs(&[("chr1".to_string(), seq.to_vec(), false)]);
        FMIndex::build(text, contigs, dna::SIGMA as u8, 4)
    }

    #[test]
    fn full_length_seed_needs_no_extension() {
        let fm = build_fm(b"ACGTACGT");
        let scoring = ScoringParams::default();
        let seed = Seed { rbeg: 0, qbeg: 0, len: 8, score: 8 };
        let chain = Chain::from_seeds(vec![seed], 0, false, false);
        let query: Vec<u8> = b"ACGTACGT".iter().map(|&b| dna::encode(b)).collect();
        let regions = extend_chain(&fm, &chain, &query, &scoring);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].qb, 0);
        assert_eq!(regions[0].qe, 8);
        assert!(regions[0].is_well_formed());
    }

    #[test]
    fn covered_seed_updates_sub_without_new_region() {
        let fm = build_fm(b"ACGTACGTACGTACGT");
        let scoring = ScoringParams::default();
        let seed_a = Seed { rbeg: 0, qbeg: 0, len: 12, score: 12 };
        let seed_b = Seed { rbeg: 2, qbeg: 2, len: 4, score: 4 };
        let chain = Chain::from_seeds(vec![seed_a, seed_b], 0, false, false);
        let query: Vec<u8> = b"ACGTACGTACGT".iter().map(|&b| dna::encode(b)).collect();
        let regions = extend_chain(&fm, &chain, &query, &scoring);
        assert_eq!(regions.len(), 1);
    }
}
