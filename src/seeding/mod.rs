//! Stage 1–2 of the per-read pipeline: SMEM discovery, midpoint reseeding,
//! chain construction and filtering (§4.1–§4.3).

pub mod chain;
pub mod smem;

use crate::config::ScoringParams;
use crate::model::Chain;
use crate::refsource::{PositionResolver, ReferenceSource};
use smem::Smem;

/// Run the full seeding stage for one query strand: initial SMEM search,
/// midpoint reseeding (§4.2), then chain construction + filtering (§4.1, §4.3).
pub fn seed_and_chain(
    resolver: &dyn PositionResolver,
    reference: &dyn ReferenceSource,
    query_bwt: &[u8],
    scoring: &ScoringParams,
) -> Vec<Chain> {
    let mut smems = smem::find_smems(resolver, query_bwt, scoring.min_seed_len);
    reseed(resolver, query_bwt, scoring, &mut smems);

    let mut chains = chain::smems_to_chains(
        resolver,
        reference,
        &smems,
        scoring.min_seed_len,
        scoring.match_score,
        scoring.max_occurrences,
        scoring.max_chain_gap,
    );

    chain::filter_chains(
        &mut chains,
        scoring.min_chain_weight,
        scoring.min_seed_len,
        scoring.chain_drop_ratio,
    );

    chains
}

/// §4.2: for every SMEM long enough and specific enough, re-search from its
/// midpoint with a raised `minIntv`, recovering shorter alternative-locus
/// seeds that the single longest match would otherwise hide.
fn reseed(
    resolver: &dyn PositionResolver,
    query_bwt: &[u8],
    scoring: &ScoringParams,
    smems: &mut Vec<Smem>,
) {
    let threshold_len = ((scoring.min_seed_len as f64) * scoring.seed_split_ratio + 0.499) as usize;
    let mut worklist: Vec<(usize, usize)> = Vec::new();

    for s in smems.iter() {
        if s.len() as usize >= threshold_len && s.occ() <= scoring.split_width {
            let midpoint = (s.qbeg as usize + s.qend as usize) / 2;
            worklist.push((midpoint, s.occ() + 1));
        }
    }

    let mut extra = Vec::new();
    while let Some((start_pos, min_intv)) = worklist.pop() {
        let found = smem::find_smems_at_position(resolver, query_bwt, start_pos, scoring.min_seed_len, min_intv);
        extra.extend(found);
    }

    smem::merge_reseeded(smems, extra);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fm::{pack_contigs, FMIndex};
    use crate::util::dna;

    fn build_test_fm(seq: &[u8]) -> FMIndex {
        let (text, contigs) = pack_contigs(&[("chr1".to_string(), seq.to_vec(), false)]);
        FMIndex::build(text, contigs, dna::SIGMA as u8, 4)
    }

    fn bwt_encode(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| dna::to_bwt_code(dna::encode(b))).collect()
    }

    #[test]
    fn seed_and_chain_produces_well_formed_chains() {
        let fm = build_test_fm(b"ACGTTGCAACGTTGCAACGTTGCAACGTTGCA");
        let query = bwt_encode(b"ACGTTGCAACGTTGCA");
        let mut scoring = ScoringParams::default();
        scoring.min_seed_len = 4;
        let chains = seed_and_chain(&fm, &fm, &query, &scoring);
        assert!(!chains.is_empty());
        for c in &chains {
            assert!(!c.seeds.is_empty());
        }
    }
}
