//! Collaborator seams (§9: "callback seams"). The pipeline consumes reference
//! data through these two traits instead of owning an `FMIndex` directly, so
//! CPU, GPU, or mock implementations substitute cleanly in tests.

/// SA-interval search and resolution, backed by the FM-index (§6).
pub trait PositionResolver: Sync {
    /// The full `[0, n)` SA interval covering every suffix.
    fn full_interval(&self) -> (usize, usize);

    /// Narrow `[l, r)` to the suffixes additionally prefixed by `a` (BWT-alphabet code).
    fn extend_left(&self, a: u8, l: usize, r: usize) -> Option<(usize, usize)>;

    /// Exact backward search for a whole BWT-alphabet pattern.
    fn backward_search(&self, pat: &[u8]) -> Option<(usize, usize)>;

    /// Materialize one BWT-space reference position from an SA interval slot
    /// at `l + offset`, or `None` once `offset` runs past `r`.
    fn resolve_sa(&self, l: usize, r: usize, offset: usize) -> Option<i64>;

    /// Number of resolvable positions in `[l, r)`.
    fn interval_count(&self, l: usize, r: usize) -> usize {
        r.saturating_sub(l)
    }
}

/// Packed reference access, backed by the FM-index's `packed_forward`/mirror (§6).
pub trait ReferenceSource: Sync {
    /// Fetch reference bases in the alignment alphabet (A=0,C=1,G=2,T=3,N=4)
    /// for BWT-space position `pos`; returns fewer than `len` bytes when the
    /// window runs past the end of the valid range.
    fn get_reference(&self, pos: i64, len: usize) -> (Vec<u8>, usize);

    /// Forward genome length G. BWT space spans `[0, 2G)`.
    fn genome_length(&self) -> i64;

    fn sequence_id(&self, pos: i64) -> i32;

    fn decode_position(&self, pos: i64) -> Option<(usize, u32)>;

    fn contig_name(&self, rid: usize) -> Option<&str>;

    fn contig_is_alt(&self, rid: usize) -> bool;

    fn contig_len(&self, rid: usize) -> u32;

    fn num_contigs(&self) -> usize;
}

impl PositionResolver for crate::index::fm::FMIndex {
    fn full_interval(&self) -> (usize, usize) {
        (0, self.bwt.len())
    }

    fn extend_left(&self, a: u8, l: usize, r: usize) -> Option<(usize, usize)> {
        crate::index::fm::FMIndex::extend_left(self, a, l, r)
    }

    fn backward_search(&self, pat: &[u8]) -> Option<(usize, usize)> {
        crate::index::fm::FMIndex::backward_search(self, pat)
    }

    fn resolve_sa(&self, l: usize, r: usize, offset: usize) -> Option<i64> {
        let idx = l + offset;
        if idx >= r {
            return None;
        }
        self.sa_interval_positions(idx, idx + 1).first().map(|&p| p as i64)
    }
}

impl ReferenceSource for crate::index::fm::FMIndex {
    fn get_reference(&self, pos: i64, len: usize) -> (Vec<u8>, usize) {
        crate::index::fm::FMIndex::get_reference(self, pos, len)
    }

    fn genome_length(&self) -> i64 {
        crate::index::fm::FMIndex::genome_length(self)
    }

    fn sequence_id(&self, pos: i64) -> i32 {
        crate::index::fm::FMIndex::sequence_id(self, pos)
    }

    fn decode_position(&self, pos: i64) -> Option<(usize, u32)> {
        crate::index::fm::FMIndex::decode_position(self, pos)
    }

    fn contig_name(&self, rid: usize) -> Option<&str> {
        self.contigs.get(rid).map(|c| c.name.as_str())
    }

    fn contig_is_alt(&self, rid: usize) -> bool {
        self.contigs.get(rid).map(|c| c.is_alt).unwrap_or(false)
    }

    fn contig_len(&self, rid: usize) -> u32 {
        self.contigs.get(rid).map(|c| c.len).unwrap_or(0)
    }

    fn num_contigs(&self) -> usize {
        self.contigs.len()
    }
}
