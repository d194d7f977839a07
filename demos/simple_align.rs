//! Demonstrates using `memalign-core` as a library: build an FM index over
//! a small reference, then run the full single-end pipeline on a read.
//!
//! Run with:
//! ```bash
//! cargo run --bin simple_align
//! ```

use std::sync::Arc;

use memalign_core::config::RunConfig;
use memalign_core::index::fm::{pack_contigs, FMIndex};
use memalign_core::io::fastq::FastqRecord;
use memalign_core::model::cigar_to_string;
use memalign_core::orchestrator::Orchestrator;
use memalign_core::util::dna;

fn main() {
    let reference = b"ACGTACGTAGCTGATCGTAGCTAGCTAGCTGATCGTAGCTAGCTAGCTGAT".to_vec();
    println!("reference: {}", std::str::from_utf8(&reference).unwrap());
    println!("length: {} bp", reference.len());

    let (packed_forward, contigs) = pack_contigs(&[("ref1".to_string(), reference.clone(), false)]);
    let fm = Arc::new(FMIndex::build(packed_forward, contigs, dna::SIGMA as u8, 16));
    println!("FM index built: BWT length = {}", fm.bwt.len());

    let pattern = dna::encode_seq(b"GCTGATCGTAG");
    let pattern_bwt: Vec<u8> = pattern.iter().map(|&c| dna::to_bwt_code(c)).collect();
    if let Some((l, r)) = fm.backward_search(&pattern_bwt) {
        println!("\nexact match 'GCTGATCGTAG': {} hit(s)", r - l);
        for &pos in fm.sa_interval_positions(l, r) {
            if let Some((cid, off)) = fm.decode_position(pos as i64) {
                println!("  contig={}, offset={}", fm.contigs[cid].name, off);
            }
        }
    }

    let orchestrator = Orchestrator::new(Arc::clone(&fm), RunConfig::default());
    let read = FastqRecord {
        id: "demo_read".to_string(),
        desc: None,
        seq: b"ACGTACGTAGCTGATCGTAG".to_vec(),
        qual: vec![b'I'; 20],
    };

    println!("\naligning read '{}'", std::str::from_utf8(&read.seq).unwrap());
    for rec in orchestrator.align_single(&read) {
        if rec.is_unmapped() {
            println!("  unmapped");
            continue;
        }
        println!(
            "  contig={} pos={} mapq={} cigar={} NM={}",
            fm.contigs.get(rec.rid as usize).map(|c| c.name.as_str()).unwrap_or("*"),
            rec.local_pos + 1,
            rec.mapq,
            cigar_to_string(&rec.cigar),
            rec.aux.nm.unwrap_or(0),
        );
    }
}
