//! Stage 8: the output record contract (§6). One [`AlignRecord`] is emitted
//! per alignment; rendering to SAM text is a thin `Write`-based formatter in
//! the same style as the teacher's `align::align_fastq_with_opt` header
//! emission, with aux tags in the fixed order the record contract specifies
//! (matching `noodles-sam`'s aux-tag-ordering convention from the pack's
//! `other_examples/`, since this crate doesn't depend on `noodles-sam`
//! itself — no BAM codec is in scope, only the typed record plus a SAM text
//! renderer).

use crate::model::{cigar_to_string, Cigar};

/// §6: "a 16-bit bitset with {paired, proper_pair, unmapped, mate_unmapped,
/// reverse, mate_reverse, read1, read2, secondary, qc_fail, duplicate,
/// supplementary}". Bit values match the SAM specification's own FLAG field
/// so the rendered text is a plain decimal of this bitset.
pub mod flags {
    pub const PAIRED: u16 = 0x001;
    pub const PROPER_PAIR: u16 = 0x002;
    pub const UNMAPPED: u16 = 0x004;
    pub const MATE_UNMAPPED: u16 = 0x008;
    pub const REVERSE: u16 = 0x010;
    pub const MATE_REVERSE: u16 = 0x020;
    pub const READ1: u16 = 0x040;
    pub const READ2: u16 = 0x080;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// One locus named in an `SA` (chimeric/supplementary) or `XA` (alternative
/// hit) aux tag. §6: "SA and XA CIGARs always use soft-clip form even if the
/// main CIGAR uses hard-clip" — callers must pass the soft-clip rendering
/// here regardless of what `AlignRecord::cigar` itself uses.
#[derive(Debug, Clone)]
pub struct AltLocus {
    pub rname: String,
    /// 1-based position, SAM convention.
    pub pos: i64,
    pub is_rev: bool,
    pub cigar_soft_clip: Cigar,
    pub mapq: u8,
    pub nm: u32,
}

impl AltLocus {
    fn xa_entry(&self) -> String {
        format!(
            "{},{}{},{},{};",
            self.rname,
            if self.is_rev { '-' } else { '+' },
            self.pos,
            cigar_to_string(&self.cigar_soft_clip),
            self.nm,
        )
    }

    fn sa_entry(&self) -> String {
        format!(
            "{},{},{},{},{},{};",
            self.rname,
            self.pos,
            if self.is_rev { '-' } else { '+' },
            cigar_to_string(&self.cigar_soft_clip),
            self.mapq,
            self.nm,
        )
    }
}

/// §6 aux tags, in the fixed emission order: `AS, XS, NM, MD, MC, pa, SA, XA,
/// RG, XR, CO`. Any field left `None`/empty is simply omitted from the line.
#[derive(Debug, Clone, Default)]
pub struct AuxTags {
    pub as_score: Option<i32>,
    pub xs: Option<i32>,
    pub nm: Option<u32>,
    pub md: Option<String>,
    /// Mate CIGAR, present only when the record is part of a pair.
    pub mc: Option<Cigar>,
    /// Fraction of the read aligned (`pa` per §6); not a standard SAM tag,
    /// carried through as a private float tag.
    pub pa: Option<f32>,
    pub sa: Vec<AltLocus>,
    pub xa: Vec<AltLocus>,
    pub rg: Option<String>,
    /// Contig annotation (§6 `XR`) — e.g. an ALT contig's parent region.
    pub xr: Option<String>,
    /// FASTQ comment line, carried through verbatim.
    pub co: Option<String>,
}

impl AuxTags {
    /// Writes the fixed-order aux tags into `out`, applying §6's XA
    /// suppression rule: "XA is suppressed if secondary count > maxXAHits
    /// (separate cap for ALT: maxXAHitsAlt)". `secondary_count` and
    /// `secondary_count_alt` are the caller's post-dedup secondary tallies
    /// for this read, split by ALT-ness.
    fn write_to(&self, out: &mut String, max_xa_hits: usize, max_xa_hits_alt: usize, secondary_count: usize, secondary_count_alt: usize) {
        use std::fmt::Write as _;

        if let Some(v) = self.as_score {
            let _ = write!(out, "\tAS:i:{v}");
        }
        if let Some(v) = self.xs {
            let _ = write!(out, "\tXS:i:{v}");
        }
        if let Some(v) = self.nm {
            let _ = write!(out, "\tNM:i:{v}");
        }
        if let Some(md) = &self.md {
            let _ = write!(out, "\tMD:Z:{md}");
        }
        if let Some(mc) = &self.mc {
            let _ = write!(out, "\tMC:Z:{}", cigar_to_string(mc));
        }
        if let Some(pa) = self.pa {
            let _ = write!(out, "\tpa:f:{pa}");
        }
        if !self.sa.is_empty() {
            let _ = write!(out, "\tSA:Z:");
            for locus in &self.sa {
                out.push_str(&locus.sa_entry());
            }
        }
        let xa_suppressed = secondary_count > max_xa_hits || secondary_count_alt > max_xa_hits_alt;
        if !self.xa.is_empty() && !xa_suppressed {
            let _ = write!(out, "\tXA:Z:");
            for locus in &self.xa {
                out.push_str(&locus.xa_entry());
            }
        }
        if let Some(rg) = &self.rg {
            let _ = write!(out, "\tRG:Z:{rg}");
        }
        if let Some(xr) = &self.xr {
            let _ = write!(out, "\tXR:Z:{xr}");
        }
        if let Some(co) = &self.co {
            let _ = write!(out, "\tCO:Z:{co}");
        }
    }
}

/// A single emitted alignment record, before SAM text rendering. Mirrors §6's
/// record contract field-for-field.
#[derive(Debug, Clone)]
pub struct AlignRecord {
    pub flags: u16,
    pub qname: String,
    pub rid: i32,
    /// 0-based local position on `rid`'s contig.
    pub local_pos: i64,
    pub mapq: u8,
    pub cigar: Cigar,
    pub mtid: i32,
    /// 0-based local position of the mate.
    pub mpos: i64,
    pub tlen: i64,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub aux: AuxTags,
}

impl AlignRecord {
    pub fn is_unmapped(&self) -> bool {
        self.flags & flags::UNMAPPED != 0
    }

    /// §7: "An unmapped read produces exactly one unmapped record... with
    /// the read's raw sequence/qualities and appropriate flags."
    pub fn unmapped(qname: String, seq: Vec<u8>, qual: Vec<u8>, extra_flags: u16) -> Self {
        Self {
            flags: flags::UNMAPPED | extra_flags,
            qname,
            rid: -1,
            local_pos: -1,
            mapq: 0,
            cigar: Vec::new(),
            mtid: -1,
            mpos: -1,
            tlen: 0,
            seq,
            qual,
            aux: AuxTags::default(),
        }
    }

    /// Render one SAM text line. `rname_of`/`qual_ascii` resolve this
    /// record's/mate's contig name and decode `seq`/`qual` to ASCII the way
    /// the caller's alphabet decoder dictates; this module stays alphabet
    /// and reference-layout agnostic.
    pub fn to_sam_line(
        &self,
        rname_of: impl Fn(i32) -> Option<String>,
        seq_ascii: &str,
        qual_ascii: &str,
        max_xa_hits: usize,
        max_xa_hits_alt: usize,
        secondary_count: usize,
        secondary_count_alt: usize,
    ) -> String {
        use std::fmt::Write as _;

        let rname = if self.rid >= 0 { rname_of(self.rid).unwrap_or_else(|| "*".to_string()) } else { "*".to_string() };
        let pos1 = if self.local_pos >= 0 { self.local_pos + 1 } else { 0 };
        let cigar_str = if self.cigar.is_empty() { "*".to_string() } else { cigar_to_string(&self.cigar) };

        let (mrname, mpos1) = if self.mtid >= 0 {
            let mate_name = if self.mtid == self.rid { "=".to_string() } else { rname_of(self.mtid).unwrap_or_else(|| "*".to_string()) };
            (mate_name, self.mpos + 1)
        } else {
            ("*".to_string(), 0)
        };

        let mut line = String::new();
        let _ = write!(
            line,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.qname, self.flags, rname, pos1, self.mapq, cigar_str, mrname, mpos1, self.tlen, seq_ascii, qual_ascii,
        );
        self.aux.write_to(&mut line, max_xa_hits, max_xa_hits_alt, secondary_count, secondary_count_alt);
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CigarOp;

    fn sample_cigar() -> Cigar {
        vec![(CigarOp::Match, 10)]
    }

    #[test]
    fn unmapped_record_carries_raw_sequence_and_flag() {
        let rec = AlignRecord::unmapped("read1".to_string(), b"ACGT".to_vec(), b"IIII".to_vec(), 0);
        assert!(rec.is_unmapped());
        assert_eq!(rec.rid, -1);
        let line = rec.to_sam_line(|_| None, "ACGT", "IIII", 5, 200, 0, 0);
        assert!(line.contains("\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII"));
    }

    #[test]
    fn mapped_record_renders_fixed_aux_order() {
        let rec = AlignRecord {
            flags: 0,
            qname: "read1".to_string(),
            rid: 0,
            local_pos: 99,
            mapq: 60,
            cigar: sample_cigar(),
            mtid: -1,
            mpos: -1,
            tlen: 0,
            seq: b"ACGTACGTAC".to_vec(),
            qual: b"IIIIIIIIII".to_vec(),
            aux: AuxTags {
                as_score: Some(10),
                xs: Some(0),
                nm: Some(0),
                md: Some("10".to_string()),
                ..Default::default()
            },
        };
        let line = rec.to_sam_line(|i| if i == 0 { Some("chr1".to_string()) } else { None }, "ACGTACGTAC", "IIIIIIIIII", 5, 200, 0, 0);
        assert!(line.contains("chr1\t100\t60\t10M"));
        let as_idx = line.find("AS:i:10").unwrap();
        let xs_idx = line.find("XS:i:0").unwrap();
        let nm_idx = line.find("NM:i:0").unwrap();
        let md_idx = line.find("MD:Z:10").unwrap();
        assert!(as_idx < xs_idx && xs_idx < nm_idx && nm_idx < md_idx);
    }

    #[test]
    fn xa_tag_suppressed_when_secondary_count_exceeds_cap() {
        let locus = AltLocus { rname: "chr2".to_string(), pos: 50, is_rev: false, cigar_soft_clip: sample_cigar(), mapq: 0, nm: 0 };
        let rec = AlignRecord {
            flags: 0,
            qname: "read1".to_string(),
            rid: 0,
            local_pos: 0,
            mapq: 60,
            cigar: sample_cigar(),
            mtid: -1,
            mpos: -1,
            tlen: 0,
            seq: b"ACGTACGTAC".to_vec(),
            qual: b"IIIIIIIIII".to_vec(),
            aux: AuxTags { xa: vec![locus], ..Default::default() },
        };
        let suppressed = rec.to_sam_line(|_| Some("chr1".to_string()), "ACGTACGTAC", "IIIIIIIIII", 1, 200, 2, 0);
        assert!(!suppressed.contains("XA:Z:"));
        let shown = rec.to_sam_line(|_| Some("chr1".to_string()), "ACGTACGTAC", "IIIIIIIIII", 5, 200, 2, 0);
        assert!(shown.contains("XA:Z:chr2,+50,10M,0;"));
    }

    #[test]
    fn sa_tag_formats_strand_and_mapq() {
        let locus = AltLocus { rname: "chr1".to_string(), pos: 200, is_rev: true, cigar_soft_clip: sample_cigar(), mapq: 30, nm: 2 };
        let rec = AlignRecord {
            flags: flags::SUPPLEMENTARY,
            qname: "read1".to_string(),
            rid: 0,
            local_pos: 0,
            mapq: 60,
            cigar: sample_cigar(),
            mtid: -1,
            mpos: -1,
            tlen: 0,
            seq: b"ACGTACGTAC".to_vec(),
            qual: b"IIIIIIIIII".to_vec(),
            aux: AuxTags { sa: vec![locus], ..Default::default() },
        };
        let line = rec.to_sam_line(|_| Some("chr1".to_string()), "ACGTACGTAC", "IIIIIIIIII", 5, 200, 0, 0);
        assert!(line.contains("SA:Z:chr1,200,-,10M,30,2;"));
    }
}
