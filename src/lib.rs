//! # memalign-core
//!
//! BWA-MEM-style short-read alignment core: SMEM seeding and chaining,
//! banded Smith-Waterman extension, dedup/patch and ALT-aware secondary
//! marking, CIGAR generation, mapping quality, and paired-end resolution
//! over an FM-indexed reference.
//!
//! ## Pipeline stages
//!
//! - [`seeding`] — SMEM discovery, midpoint reseeding, chain construction/filtering (§4.1–§4.3)
//! - [`extend`] — tiered banded Smith-Waterman seed extension (§4.4)
//! - [`regions`] — dedup/patch and ALT-aware secondary marking (§4.5–§4.6)
//! - [`cigar`] — CIGAR generation with NM/MD (§4.7)
//! - [`mapq`] — mapping quality estimation (§4.8)
//! - [`pairing`] — insert-size estimation, mate rescue, pair resolution (§4.9)
//! - [`record`] — the output record contract and SAM text rendering (§6)
//! - [`orchestrator`] — batch dispatch and end-to-end per-read/per-pair wiring (§5)
//!
//! `index` builds and serves the FM-index collaborator; `refsource` is the
//! trait seam ([`refsource::PositionResolver`], [`refsource::ReferenceSource`])
//! the rest of the pipeline consumes it through, so a mock or GPU-backed
//! collaborator substitutes cleanly in tests or alternative deployments.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use memalign_core::index::fm::{pack_contigs, FMIndex};
//! use memalign_core::config::RunConfig;
//! use memalign_core::orchestrator::Orchestrator;
//! use memalign_core::io::fastq::FastqRecord;
//! use memalign_core::util::dna;
//! use std::sync::Arc;
//!
//! let (text, contigs) = pack_contigs(&[("chr1".to_string(), b"ACGTACGTAGCTGATCGTAG".to_vec(), false)]);
//! let fm = Arc::new(FMIndex::build(text, contigs, dna::SIGMA as u8, 16));
//! let orchestrator = Orchestrator::new(fm, RunConfig::default());
//!
//! let read = FastqRecord { id: "r1".to_string(), desc: None, seq: b"ACGTACGTAG".to_vec(), qual: vec![b'I'; 10] };
//! let records = orchestrator.align_single(&read);
//! assert!(!records.is_empty());
//! ```

pub mod cigar;
pub mod config;
pub mod errors;
pub mod extend;
pub mod index;
pub mod io;
pub mod mapq;
pub mod model;
pub mod orchestrator;
pub mod pairing;
pub mod record;
pub mod refsource;
pub mod regions;
pub mod seeding;
pub mod util;
