//! End-to-end tests over the full orchestrator pipeline: FASTA -> FM index
//! -> FASTQ -> aligned records, covering the scenarios §8 calls out.

use std::sync::Arc;

use memalign_core::config::{flag_bits, RunConfig};
use memalign_core::index::fm::{pack_contigs, FMIndex};
use memalign_core::io::fastq::FastqRecord;
use memalign_core::model::CigarOp;
use memalign_core::orchestrator::Orchestrator;
use memalign_core::record::flags;
use memalign_core::util::dna;

fn pseudo_random_seq(len: usize, seed: u32) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut x = seed;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            bases[(x >> 16) as usize % 4]
        })
        .collect()
}

fn build_index(contigs: &[(&str, Vec<u8>, bool)]) -> Arc<FMIndex> {
    let records: Vec<(String, Vec<u8>, bool)> =
        contigs.iter().map(|(name, seq, is_alt)| (name.to_string(), seq.clone(), *is_alt)).collect();
    let (packed_forward, contigs) = pack_contigs(&records);
    Arc::new(FMIndex::build(packed_forward, contigs, dna::SIGMA as u8, 16))
}

fn fastq(id: &str, seq: &[u8]) -> FastqRecord {
    FastqRecord { id: id.to_string(), desc: None, seq: seq.to_vec(), qual: vec![b'I'; seq.len()] }
}

#[test]
fn perfect_match_aligns_with_full_match_cigar() {
    let reference = pseudo_random_seq(500, 1);
    let fm = build_index(&[("chr1", reference.clone(), false)]);
    let orchestrator = Orchestrator::new(fm, RunConfig::default());

    let read = &reference[100..160];
    let records = orchestrator.align_single(&fastq("r1", read));

    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert!(!rec.is_unmapped());
    assert_eq!(rec.local_pos, 100);
    assert_eq!(rec.cigar, vec![(CigarOp::Match, 60)]);
    assert_eq!(rec.aux.nm, Some(0));
    assert_eq!(rec.mapq, 60);
}

#[test]
fn single_substitution_still_aligns_with_nonzero_nm() {
    let reference = pseudo_random_seq(500, 2);
    let fm = build_index(&[("chr1", reference.clone(), false)]);
    let orchestrator = Orchestrator::new(fm, RunConfig::default());

    let mut read = reference[100..160].to_vec();
    let mutate_at = 30;
    read[mutate_at] = if read[mutate_at] == b'A' { b'C' } else { b'A' };

    let records = orchestrator.align_single(&fastq("r2", &read));
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert!(!rec.is_unmapped());
    assert_eq!(rec.local_pos, 100);
    assert_eq!(rec.aux.nm, Some(1));
}

#[test]
fn reverse_complement_read_sets_reverse_flag() {
    let reference = pseudo_random_seq(500, 3);
    let fm = build_index(&[("chr1", reference.clone(), false)]);
    let orchestrator = Orchestrator::new(fm, RunConfig::default());

    let read = dna::revcomp(&reference[200..260]);
    let records = orchestrator.align_single(&fastq("r3", &read));

    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert!(!rec.is_unmapped());
    assert_eq!(rec.flags & flags::REVERSE, flags::REVERSE);
    assert_eq!(rec.local_pos, 200);
}

#[test]
fn unrelated_read_produces_single_unmapped_record() {
    let reference = pseudo_random_seq(500, 4);
    let fm = build_index(&[("chr1", reference, false)]);
    let orchestrator = Orchestrator::new(fm, RunConfig::default());

    let unrelated = pseudo_random_seq(80, 999);
    let records = orchestrator.align_single(&fastq("r4", &unrelated));

    assert_eq!(records.len(), 1);
    assert!(records[0].is_unmapped());
    assert_eq!(records[0].seq, unrelated);
}

#[test]
fn insertion_in_read_is_reflected_in_cigar() {
    let reference = pseudo_random_seq(500, 5);
    let fm = build_index(&[("chr1", reference.clone(), false)]);
    let orchestrator = Orchestrator::new(fm, RunConfig::default());

    let mut read = reference[100..160].to_vec();
    // Splice 3 extra bases in the middle of the read, unmatched by the reference.
    read.splice(30..30, [b'A', b'C', b'G']);

    let records = orchestrator.align_single(&fastq("r5", &read));
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert!(!rec.is_unmapped());
    let has_insertion = rec.cigar.iter().any(|&(op, _)| op == CigarOp::Ins);
    assert!(has_insertion, "expected an insertion op in {:?}", rec.cigar);
}

#[test]
fn paired_end_concordant_mates_are_marked_proper_pair() {
    let reference = pseudo_random_seq(2000, 6);
    let fm = build_index(&[("chr1", reference.clone(), false)]);
    let orchestrator = Orchestrator::new(Arc::clone(&fm), RunConfig::default());

    // Build enough concordant FR pairs (mate2 reverse-complemented, downstream
    // of mate1 by a fixed insert size) for insert-size estimation to succeed.
    let insert = 300usize;
    let read_len = 70usize;
    let mut pairs = Vec::new();
    for i in 0..30 {
        let start = 50 + i * 5;
        if start + insert > reference.len() {
            break;
        }
        let r1 = reference[start..start + read_len].to_vec();
        let r2 = dna::revcomp(&reference[start + insert - read_len..start + insert]);
        pairs.push((fastq(&format!("p{i}/1"), &r1), fastq(&format!("p{i}/2"), &r2)));
    }

    let dist = orchestrator.estimate_insert_size(&pairs);
    let mut out = Vec::new();
    orchestrator.align_pair_batch(&pairs[..1], &dist, &mut out).unwrap();
    let sam = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = sam.lines().collect();
    assert_eq!(lines.len(), 2);
    let flags1: u16 = lines[0].split('\t').nth(1).unwrap().parse().unwrap();
    let flags2: u16 = lines[1].split('\t').nth(1).unwrap().parse().unwrap();
    assert_eq!(flags1 & flags::PROPER_PAIR, flags::PROPER_PAIR);
    assert_eq!(flags2 & flags::PROPER_PAIR, flags::PROPER_PAIR);
    assert_eq!(flags1 & flags::READ1, flags::READ1);
    assert_eq!(flags2 & flags::READ2, flags::READ2);
}

#[test]
fn no_pairing_flag_bypasses_pair_resolution() {
    let reference = pseudo_random_seq(2000, 7);
    let fm = build_index(&[("chr1", reference.clone(), false)]);
    let config = RunConfig { flags: flag_bits::NO_PAIRING, ..RunConfig::default() };
    let orchestrator = Orchestrator::new(fm, config);

    let insert = 300usize;
    let read_len = 70usize;
    let start = 50usize;
    let r1 = reference[start..start + read_len].to_vec();
    let r2 = dna::revcomp(&reference[start + insert - read_len..start + insert]);
    let pair = vec![(fastq("p0/1", &r1), fastq("p0/2", &r2))];

    let dist = orchestrator.estimate_insert_size(&pair);
    let mut out = Vec::new();
    orchestrator.align_pair_batch(&pair, &dist, &mut out).unwrap();
    let sam = String::from_utf8(out).unwrap();

    for line in sam.lines() {
        let flags_val: u16 = line.split('\t').nth(1).unwrap().parse().unwrap();
        assert_eq!(flags_val & flags::PROPER_PAIR, 0, "line carried PROPER_PAIR despite --no-pairing: {line}");
    }
}

#[test]
fn write_header_emits_sq_lines_per_contig() {
    let fm = build_index(&[("chr1", pseudo_random_seq(200, 8), false), ("chr2", pseudo_random_seq(200, 9), false)]);
    let mut out = Vec::new();
    memalign_core::orchestrator::write_header(&mut out, fm.as_ref()).unwrap();
    let header = String::from_utf8(out).unwrap();
    assert!(header.contains("@SQ\tSN:chr1\tLN:200"));
    assert!(header.contains("@SQ\tSN:chr2\tLN:200"));
}
