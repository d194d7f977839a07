//! SMEM → Chain (§4.1) and ChainFilter (§4.3).
//!
//! Grounded in the teacher's `align::chain`: chains are still grouped per
//! reference contig and carried as `Vec<Seed>` sorted by `rbeg`, but the
//! grouping rule itself follows the spec's single-pass "join the youngest
//! compatible chain" sweep rather than the teacher's DP best-path search —
//! the DP approach picks one optimal path per contig and throws away
//! alternate loci, which would silently drop repetitive hits the filter
//! stage (§4.3) is supposed to judge.

use crate::model::{Chain, Seed};
use crate::refsource::{PositionResolver, ReferenceSource};
use crate::seeding::smem::Smem;

struct MaterializedSeed {
    seed: Seed,
    rid: i32,
    is_rev: bool,
    is_alt: bool,
}

/// Convert a read's SMEMs into chains, per §4.1.
pub fn smems_to_chains(
    resolver: &dyn PositionResolver,
    reference: &dyn ReferenceSource,
    smems: &[Smem],
    min_seed_len: usize,
    match_score: i32,
    max_occurrences: usize,
    max_chain_gap: i64,
) -> Vec<Chain> {
    let g = reference.genome_length();
    let mut materialized: Vec<MaterializedSeed> = Vec::new();

    for smem in smems {
        if smem.len() as usize < min_seed_len {
            continue;
        }
        let occurrences = smem.occ();
        let step = (occurrences / max_occurrences).max(1);
        let mut slot = 0usize;
        let mut emitted = 0usize;
        while slot < occurrences && emitted < max_occurrences {
            let Some(p) = resolver.resolve_sa(smem.l, smem.r, slot) else {
                break;
            };
            slot += step;
            emitted += 1;

            let len = smem.len();
            let (fwd, is_rev) = if p >= g {
                (2 * g - p - len as i64, true)
            } else {
                (p, false)
            };
            let Some((rid, _local)) = reference.decode_position(fwd) else {
                continue;
            };

            materialized.push(MaterializedSeed {
                seed: Seed {
                    rbeg: fwd,
                    qbeg: smem.qbeg,
                    len,
                    score: len * match_score,
                },
                rid: rid as i32,
                is_rev,
                is_alt: reference.contig_is_alt(rid),
            });
        }
    }

    build_chains(materialized, max_chain_gap)
}

struct ChainBuilder {
    rid: i32,
    is_rev: bool,
    is_alt: bool,
    seeds: Vec<Seed>,
}

fn build_chains(materialized: Vec<MaterializedSeed>, max_chain_gap: i64) -> Vec<Chain> {
    let mut builders: Vec<ChainBuilder> = Vec::new();

    for m in materialized {
        let mut joined = false;
        for b in builders.iter_mut().rev() {
            if b.rid != m.rid || b.is_rev != m.is_rev {
                continue;
            }
            let last = b.seeds.last().expect("chain builder never empty");
            let ref_gap = (m.seed.rbeg - last.rend()).unsigned_abs() as i64;
            let query_gap = (m.seed.qbeg - last.qend()).unsigned_abs() as i64;
            if ref_gap.max(query_gap) < max_chain_gap {
                b.seeds.push(m.seed);
                joined = true;
                break;
            }
        }
        if !joined {
            builders.push(ChainBuilder {
                rid: m.rid,
                is_rev: m.is_rev,
                is_alt: m.is_alt,
                seeds: vec![m.seed],
            });
        }
    }

    builders
        .into_iter()
        .map(|b| Chain::from_seeds(b.seeds, b.rid, b.is_alt, b.is_rev))
        .collect()
}

/// §4.3: drop weak chains, then suppress chains overlapping a heavier one
/// unless the heavier chain is ALT and the lighter one is primary.
pub fn filter_chains(
    chains: &mut Vec<Chain>,
    min_chain_weight: i32,
    min_seed_len: usize,
    chain_drop_ratio: f64,
) {
    for c in chains.iter_mut() {
        c.weight = chain_weight(c);
    }

    let floor = min_chain_weight.max(min_seed_len as i32);
    chains.retain(|c| c.weight >= floor);

    chains.sort_by(|a, b| b.weight.cmp(&a.weight));

    let spans: Vec<(i32, i32)> = chains.iter().map(query_span).collect();
    let mut dropped = vec![false; chains.len()];

    for i in 0..chains.len() {
        if dropped[i] {
            continue;
        }
        for j in (i + 1)..chains.len() {
            if dropped[j] {
                continue;
            }
            let (qi_lo, qi_hi) = spans[i];
            let (qj_lo, qj_hi) = spans[j];
            let overlap = qi_lo.max(qj_lo)..qi_hi.min(qj_hi);
            let overlap_len = (overlap.end - overlap.start).max(0) as f64;
            let j_span = (qj_hi - qj_lo).max(1) as f64;

            let alt_guard = chains[i].is_alt && !chains[j].is_alt;
            if !alt_guard
                && overlap_len / j_span > chain_drop_ratio
                && (chains[j].weight as f64) < chain_drop_ratio * chains[i].weight as f64
            {
                dropped[j] = true;
            }
        }
    }

    let mut idx = 0;
    chains.retain(|_| {
        let keep = !dropped[idx];
        idx += 1;
        keep
    });
}

fn chain_weight(chain: &Chain) -> i32 {
    let mut covered: Vec<(i32, i32)> = chain.seeds.iter().map(|s| (s.qbeg, s.qend())).collect();
    covered.sort();
    let mut weight = 0i32;
    let mut cursor = i32::MIN;
    for (qb, qe) in covered {
        let start = qb.max(cursor);
        if qe > start {
            weight += qe - start;
            cursor = qe;
        }
    }
    weight
}

fn query_span(chain: &Chain) -> (i32, i32) {
    chain.query_span()
}
