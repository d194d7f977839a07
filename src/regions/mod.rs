//! Stage 4: candidate-region cleanup between extension and CIGAR generation
//! (§4.5–§4.6).

pub mod dedup;
pub mod secondary;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::ScoringParams;
use crate::model::AlnRegion;
use crate::refsource::ReferenceSource;

pub fn finalize_regions(
    regions: &mut Vec<AlnRegion>,
    reference: &dyn ReferenceSource,
    forward_query: &[u8],
    revcomp_query: &[u8],
    scoring: &ScoringParams,
    read_id: &str,
) {
    dedup::dedup_patch(regions, reference, forward_query, revcomp_query, scoring);
    assign_region_hashes(regions, read_id);
    secondary::mark_secondary(regions, scoring);
}

/// §4.6: `hash64(readId⊕i)`, a deterministic tie-breaker for the secondary-mark
/// sort. Assigned after dedup so the index `i` matches the region set
/// `mark_secondary` actually ranks, not a pre-merge count.
fn assign_region_hashes(regions: &mut [AlnRegion], read_id: &str) {
    for (i, region) in regions.iter_mut().enumerate() {
        let mut hasher = DefaultHasher::new();
        read_id.hash(&mut hasher);
        i.hash(&mut hasher);
        region.hash = hasher.finish();
    }
}
