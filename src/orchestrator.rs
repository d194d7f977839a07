//! Stage 9: the orchestrator (§5). Owns the read-only FM-index/reference
//! collaborator and run configuration, dispatches per-read/per-pair work
//! across a `rayon` pool the way the teacher's `align::align_fastq_with_opt`
//! does, and writes records out in input order. Promotion of a paired-end
//! winner and its MAPQ adjustment (§4.9 "Promotion and MAPQ adjustment")
//! live here, since that step needs the whole pipeline's output, not any
//! one stage in isolation.

use std::io::Write;
use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::cigar;
use crate::config::{flag_bits, RunConfig, ScoringParams};
use crate::errors::Error;
use crate::extend;
use crate::io::fastq::FastqRecord;
use crate::mapq;
use crate::model::{AlnRegion, Cigar, CigarOp, InsertSizeDistribution, Seed};
use crate::pairing;
use crate::record::{flags, AlignRecord, AltLocus, AuxTags};
use crate::refsource::{PositionResolver, ReferenceSource};
use crate::regions;
use crate::seeding;
use crate::util::dna;

/// Everything the pipeline needs from the index, bundled behind one bound so
/// call sites don't juggle two separate trait objects (§9 "callback seams").
pub trait Collaborator: PositionResolver + ReferenceSource {}
impl<T: PositionResolver + ReferenceSource> Collaborator for T {}

pub struct Orchestrator<C: Collaborator + Sync> {
    collaborator: Arc<C>,
    config: RunConfig,
}

impl<C: Collaborator + Sync> Orchestrator<C> {
    pub fn new(collaborator: Arc<C>, config: RunConfig) -> Self {
        Self { collaborator, config }
    }

    pub fn align_single(&self, rec: &FastqRecord) -> Vec<AlignRecord> {
        align_one_read(self.collaborator.as_ref(), &self.config, rec, 0)
    }

    /// Batch single-end alignment over a `numThreads`-sized pool. `rayon`'s
    /// `par_iter().map(...).collect()` preserves input order, matching §5's
    /// "output written in input order" without any explicit index bookkeeping.
    pub fn align_batch<W: Write>(&self, batch: &[FastqRecord], out: &mut W) -> crate::errors::Result<()> {
        info!("dispatching batch of {} reads", batch.len());
        let pool = self.build_pool();
        let collaborator = self.collaborator.as_ref();
        let config = &self.config;

        let results: Vec<Vec<AlignRecord>> = pool.install(|| {
            batch.par_iter().map(|rec| align_one_read(collaborator, config, rec, 0)).collect()
        });

        for records in results {
            for rec in &records {
                write_record(out, rec, collaborator)?;
            }
        }
        info!("batch drained");
        Ok(())
    }

    /// Paired-end alignment for one sub-batch of mate pairs (§5 streaming
    /// pair buffering). `dist` is the shared, read-only insert-size
    /// distribution built once from the first ready sub-batch.
    pub fn align_pair_batch<W: Write>(
        &self,
        batch: &[(FastqRecord, FastqRecord)],
        dist: &InsertSizeDistribution,
        out: &mut W,
    ) -> crate::errors::Result<()> {
        info!("dispatching paired batch of {} pairs", batch.len());
        let pool = self.build_pool();
        let collaborator = self.collaborator.as_ref();
        let config = &self.config;

        let results: Vec<(Vec<AlignRecord>, Vec<AlignRecord>)> = pool.install(|| {
            batch.par_iter().map(|(r1, r2)| align_one_pair(collaborator, config, dist, r1, r2)).collect()
        });

        for (recs1, recs2) in results {
            for rec in recs1.iter().chain(recs2.iter()) {
                write_record(out, rec, collaborator)?;
            }
        }
        info!("paired batch drained");
        Ok(())
    }

    /// §4.9 insert-size estimation pre-pass: only pairs whose mates each
    /// resolve to a single-end MAPQ≥20 primary contribute a sample.
    pub fn estimate_insert_size(&self, sample_batch: &[(FastqRecord, FastqRecord)]) -> InsertSizeDistribution {
        let collaborator = self.collaborator.as_ref();
        let config = &self.config;
        let mut samples = Vec::new();

        for (r1, r2) in sample_batch {
            let pipeline1 = run_single_end_pipeline(collaborator, config, r1);
            let pipeline2 = run_single_end_pipeline(collaborator, config, r2);
            let (Some(p1), Some(p2)) = (best_primary(&pipeline1.regions), best_primary(&pipeline2.regions)) else {
                continue;
            };
            if p1.rid != p2.rid {
                continue;
            }
            let q1 = mapq::compute_mapq(&pipeline1.regions, p1, pipeline1.read_len, config.scoring.match_score);
            let q2 = mapq::compute_mapq(&pipeline2.regions, p2, pipeline2.read_len, config.scoring.match_score);
            if q1 < 20 || q2 < 20 {
                continue;
            }
            let orientation = pairing::classify_orientation(p1.rb, p1.is_rev, p2.rb, p2.is_rev);
            let insert_size = (p1.re.max(p2.re) - p1.rb.min(p2.rb)).abs();
            samples.push(pairing::SizeSample { orientation, insert_size });
        }

        if samples.len() < 25 {
            warn!("insert-size sample pool has only {} usable pairs; per-orientation estimates may be marked failed", samples.len());
        }
        let dist = pairing::estimate(&samples);
        info!("insert-size distribution finalized from {} samples", samples.len());
        dist
    }

    fn build_pool(&self) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().expect("default rayon pool"))
    }
}

/// Output of the per-read pipeline stages shared between single-end and
/// paired-end call sites, kept around so mate rescue has the query codes
/// and insert-size estimation has the raw region set without re-seeding.
struct ReadPipeline {
    regions: Vec<AlnRegion>,
    forward_query: Vec<u8>,
    revcomp_query: Vec<u8>,
    read_len: i32,
}

fn best_primary(regions: &[AlnRegion]) -> Option<&AlnRegion> {
    regions.iter().filter(|r| r.secondary.is_primary()).max_by(|a, b| a.score.cmp(&b.score))
}

/// §4.1–§4.6: seed, chain, extend, dedup/patch, and mark secondary for one
/// read. A single SMEM search over the forward-read BWT encoding finds hits
/// on both strands at once (mirror-range hits are the reverse strand); each
/// chain then picks the matching oriented query for extension.
fn run_single_end_pipeline(collaborator: &(impl Collaborator + ?Sized), config: &RunConfig, rec: &FastqRecord) -> ReadPipeline {
    let forward_query = dna::encode_seq(&rec.seq);
    let revcomp_query = dna::revcomp_codes(&forward_query);
    let read_len = forward_query.len() as i32;

    if forward_query.is_empty() {
        return ReadPipeline { regions: Vec::new(), forward_query, revcomp_query, read_len };
    }

    let query_bwt: Vec<u8> = forward_query.iter().map(|&c| dna::to_bwt_code(c)).collect();
    let chains = seeding::seed_and_chain(collaborator, collaborator, &query_bwt, &config.scoring);
    debug!("read {}: {} chains after filtering", rec.id, chains.len());

    let mut regions = Vec::new();
    for chain in &chains {
        let oriented_chain = orient_chain_for_extension(chain, read_len);
        let oriented_query: &[u8] = if chain.is_rev { &revcomp_query } else { &forward_query };
        let extended = extend::extend_chain(collaborator, &oriented_chain, oriented_query, &config.scoring);
        regions.extend(extended);
    }
    debug!("read {}: {} regions before dedup", rec.id, regions.len());

    regions::finalize_regions(&mut regions, collaborator, &forward_query, &revcomp_query, &config.scoring, &rec.id);
    debug!("read {}: {} regions after dedup/secondary", rec.id, regions.len());

    ReadPipeline { regions, forward_query, revcomp_query, read_len }
}

/// A chain's seeds carry `qbeg`/`qend` in the forward read's coordinates
/// (the BWT search never reverses the query — mirror-range hits are
/// detected by position, not by re-querying). Reverse-strand chains need
/// those indices translated into the reverse-complemented query's frame
/// before [`extend::extend_chain`] can slice into it directly.
fn orient_chain_for_extension(chain: &crate::model::Chain, read_len: i32) -> crate::model::Chain {
    if !chain.is_rev {
        return chain.clone();
    }
    let seeds: Vec<Seed> = chain
        .seeds
        .iter()
        .map(|s| Seed { rbeg: s.rbeg, qbeg: read_len - s.qend(), len: s.len, score: s.score })
        .collect();
    crate::model::Chain::from_seeds(seeds, chain.rid, chain.is_alt, chain.is_rev)
}

fn region_cigar(collaborator: &(impl ReferenceSource + ?Sized), scoring: &ScoringParams, pipeline: &ReadPipeline, region: &AlnRegion) -> crate::model::CigarResult {
    let oriented: &[u8] = if region.is_rev { &pipeline.revcomp_query } else { &pipeline.forward_query };
    let qb = region.qb.max(0) as usize;
    let qe = (region.qe as usize).min(oriented.len());
    let query_slice = if qb < qe { &oriented[qb..qe] } else { &[] };

    let ref_len = (region.re - region.rb).max(0) as usize;
    let (target, avail) = collaborator.get_reference(region.rb, ref_len);
    let target = &target[..avail];

    cigar::generate_cigar(query_slice, target, scoring, region.true_score, region.rb, pipeline.read_len, region.qb, region.qe, region.is_rev)
}

fn hard_clip_ends(cigar: &mut Cigar) {
    if let Some(first) = cigar.first_mut() {
        if first.0 == CigarOp::SoftClip {
            first.0 = CigarOp::HardClip;
        }
    }
    if let Some(last) = cigar.last_mut() {
        if last.0 == CigarOp::SoftClip {
            last.0 = CigarOp::HardClip;
        }
    }
}

fn trim_for_hard_clip(seq: &str, qual: &str, cigar: &Cigar) -> (String, String) {
    let lead = cigar.first().filter(|(op, _)| *op == CigarOp::HardClip).map(|&(_, l)| l as usize).unwrap_or(0);
    let trail = cigar.last().filter(|(op, _)| *op == CigarOp::HardClip).map(|&(_, l)| l as usize).unwrap_or(0);
    let chars: Vec<char> = seq.chars().collect();
    let qchars: Vec<char> = qual.chars().collect();
    let end = chars.len().saturating_sub(trail).max(lead);
    (chars[lead..end].iter().collect(), qchars[lead..end].iter().collect())
}

fn seq_and_qual_ascii(rec: &FastqRecord, is_rev: bool) -> (String, String) {
    if is_rev {
        let seq = dna::revcomp(&rec.seq);
        let mut qual = rec.qual.clone();
        qual.reverse();
        (String::from_utf8_lossy(&seq).into_owned(), String::from_utf8_lossy(&qual).into_owned())
    } else {
        (String::from_utf8_lossy(&rec.seq).into_owned(), String::from_utf8_lossy(&rec.qual).into_owned())
    }
}

/// §4.7/§6: build one `AlignRecord` for `region`, with `base_flags` already
/// carrying pairing/read1-read2 bits the caller knows about.
#[allow(clippy::too_many_arguments)]
fn build_record(
    collaborator: &(impl ReferenceSource + ?Sized),
    config: &RunConfig,
    rec: &FastqRecord,
    pipeline: &ReadPipeline,
    region: &AlnRegion,
    mapq_value: i32,
    base_flags: u16,
    as_role: RecordRole,
) -> AlignRecord {
    let scoring = &config.scoring;
    let mut cigar_result = region_cigar(collaborator, scoring, pipeline, region);

    let mut flag = base_flags;
    if region.is_rev {
        flag |= flags::REVERSE;
    }
    let mut final_cigar = cigar_result.cigar.clone();
    match as_role {
        RecordRole::Primary => {}
        RecordRole::Supplementary => {
            flag |= flags::SUPPLEMENTARY;
            if !config.has_flag(flag_bits::SOFT_CLIP) {
                hard_clip_ends(&mut final_cigar);
            }
        }
        RecordRole::Secondary => {
            flag |= flags::SECONDARY;
        }
    }

    let (mut seq_ascii, mut qual_ascii) = seq_and_qual_ascii(rec, region.is_rev);
    if matches!(as_role, RecordRole::Supplementary) && !config.has_flag(flag_bits::SOFT_CLIP) {
        let (s, q) = trim_for_hard_clip(&seq_ascii, &qual_ascii, &final_cigar);
        seq_ascii = s;
        qual_ascii = q;
    }

    let (rid, local_pos) = collaborator
        .decode_position(cigar_result.pos)
        .map(|(rid, off)| (rid as i32, off as i64))
        .unwrap_or((region.rid, region.rb));

    cigar_result.cigar = final_cigar;

    AlignRecord {
        flags: flag,
        qname: rec.id.clone(),
        rid,
        local_pos,
        mapq: mapq_value.clamp(0, 60) as u8,
        cigar: cigar_result.cigar,
        mtid: -1,
        mpos: -1,
        tlen: 0,
        seq: seq_ascii.into_bytes(),
        qual: qual_ascii.into_bytes(),
        aux: AuxTags {
            as_score: Some(cigar_result.score),
            nm: Some(cigar_result.nm),
            md: Some(cigar_result.md),
            co: rec.desc.clone(),
            ..Default::default()
        },
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RecordRole {
    Primary,
    Supplementary,
    Secondary,
}

/// §7 "user-visible behavior": unmapped → one record; one region → one
/// primary; multiple regions → one primary plus supplementaries (NoMulti=0),
/// XA-tagged secondaries (NoMulti=1, All=0), or secondary records (All=1).
fn align_one_read(collaborator: &(impl Collaborator + ?Sized), config: &RunConfig, rec: &FastqRecord, base_flags: u16) -> Vec<AlignRecord> {
    let pipeline = run_single_end_pipeline(collaborator, config, rec);
    let mut viable: Vec<&AlnRegion> = pipeline.regions.iter().filter(|r| r.score >= config.scoring.min_output_score).collect();

    if viable.is_empty() {
        return vec![AlignRecord::unmapped(rec.id.clone(), rec.seq.clone(), rec.qual.clone(), base_flags)];
    }

    if config.has_flag(flag_bits::PRIMARY5) {
        viable.sort_by_key(|r| r.rb);
    } else {
        viable.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| b.secondary.is_primary().cmp(&a.secondary.is_primary())));
    }

    let primary_region = viable[0];
    let mapq_value = mapq::compute_mapq(&pipeline.regions, primary_region, pipeline.read_len, config.scoring.match_score);

    let mut records = vec![build_record(collaborator, config, rec, &pipeline, primary_region, mapq_value, base_flags, RecordRole::Primary)];

    let others: Vec<&AlnRegion> = viable.iter().skip(1).copied().collect();
    if others.is_empty() {
        return records;
    }

    if config.has_flag(flag_bits::ALL) {
        for r in &others {
            records.push(build_record(collaborator, config, rec, &pipeline, r, 0, base_flags, RecordRole::Secondary));
        }
    } else if config.has_flag(flag_bits::NO_MULTI) {
        let xa: Vec<AltLocus> = others
            .iter()
            .take(config.scoring.max_xa_hits.max(config.scoring.max_xa_hits_alt))
            .map(|r| alt_locus(collaborator, config, &pipeline, r))
            .collect();
        let alt_count = others.iter().filter(|r| r.is_alt).count();
        let non_alt_count = others.len() - alt_count;
        records[0].aux.xs = others.first().map(|r| r.score);
        if non_alt_count <= config.scoring.max_xa_hits && alt_count <= config.scoring.max_xa_hits_alt {
            records[0].aux.xa = xa;
        }
    } else {
        records[0].aux.xs = others.first().map(|r| r.score);
        for r in &others {
            records.push(build_record(collaborator, config, rec, &pipeline, r, 0, base_flags, RecordRole::Supplementary));
        }
    }

    records
}

fn alt_locus(collaborator: &(impl ReferenceSource + ?Sized), config: &RunConfig, pipeline: &ReadPipeline, region: &AlnRegion) -> AltLocus {
    let cigar_result = region_cigar(collaborator, &config.scoring, pipeline, region);
    let rname = collaborator.contig_name(region.rid as usize).unwrap_or("*").to_string();
    let (_, local_pos) = collaborator.decode_position(cigar_result.pos).unwrap_or((region.rid as usize, region.rb as u32));
    AltLocus {
        rname,
        pos: local_pos as i64 + 1,
        is_rev: region.is_rev,
        cigar_soft_clip: cigar_result.cigar,
        mapq: 0,
        nm: cigar_result.nm,
    }
}

/// §4.9: resolve the best pair, rescue an unmapped mate if the distribution
/// allows it, promote the winning regions to index 0, and adjust MAPQ.
fn align_one_pair(
    collaborator: &(impl Collaborator + ?Sized),
    config: &RunConfig,
    dist: &InsertSizeDistribution,
    rec1: &FastqRecord,
    rec2: &FastqRecord,
) -> (Vec<AlignRecord>, Vec<AlignRecord>) {
    if config.has_flag(flag_bits::NO_PAIRING) {
        return (
            align_one_read(collaborator, config, rec1, flags::PAIRED | flags::READ1),
            align_one_read(collaborator, config, rec2, flags::PAIRED | flags::READ2),
        );
    }

    let mut pipeline1 = run_single_end_pipeline(collaborator, config, rec1);
    let mut pipeline2 = run_single_end_pipeline(collaborator, config, rec2);

    if !config.has_flag(flag_bits::NO_RESCUE) {
        if best_primary(&pipeline1.regions).is_none() {
            if let Some(p2) = best_primary(&pipeline2.regions) {
                if let Some(rescued) = pairing::rescue_mate(p2, p2.rid, dist, collaborator, &pipeline1.forward_query, &pipeline1.revcomp_query, &config.scoring) {
                    pipeline1.regions.push(rescued);
                    regions::finalize_regions(&mut pipeline1.regions, collaborator, &pipeline1.forward_query, &pipeline1.revcomp_query, &config.scoring, &rec1.id);
                }
            }
        }
        if best_primary(&pipeline2.regions).is_none() {
            if let Some(p1) = best_primary(&pipeline1.regions) {
                if let Some(rescued) = pairing::rescue_mate(p1, p1.rid, dist, collaborator, &pipeline2.forward_query, &pipeline2.revcomp_query, &config.scoring) {
                    pipeline2.regions.push(rescued);
                    regions::finalize_regions(&mut pipeline2.regions, collaborator, &pipeline2.forward_query, &pipeline2.revcomp_query, &config.scoring, &rec2.id);
                }
            }
        }
    }

    let decision = pairing::resolve_pair(&pipeline1.regions, &pipeline2.regions, dist, &config.scoring);

    let mut recs1 = align_one_read(collaborator, config, rec1, flags::PAIRED | flags::READ1);
    let mut recs2 = align_one_read(collaborator, config, rec2, flags::PAIRED | flags::READ2);

    if let Some(decision) = decision {
        let r1 = &pipeline1.regions[decision.idx1];
        let r2 = &pipeline2.regions[decision.idx2];

        let q_se1 = recs1.first().map(|r| r.mapq as i32).unwrap_or(0);
        let q_se2 = recs2.first().map(|r| r.mapq as i32).unwrap_or(0);
        let single_end_floor = (q_se1 - config.scoring.unpaired_penalty).max(q_se2 - config.scoring.unpaired_penalty);
        let second_best_or_single = decision.second_best_score.max(single_end_floor);

        let mapq1 = pairing::adjust_mapq(q_se1, decision.score, second_best_or_single, decision.n_sub, config.scoring.match_score);
        let mapq2 = pairing::adjust_mapq(q_se2, decision.score, second_best_or_single, decision.n_sub, config.scoring.match_score);

        let promoted1 = build_record(collaborator, config, rec1, &pipeline1, r1, mapq1, flags::PAIRED | flags::READ1 | flags::PROPER_PAIR, RecordRole::Primary);
        let promoted2 = build_record(collaborator, config, rec2, &pipeline2, r2, mapq2, flags::PAIRED | flags::READ2 | flags::PROPER_PAIR, RecordRole::Primary);

        recs1[0] = promoted1;
        recs2[0] = promoted2;

        link_mates(&mut recs1[0], &mut recs2[0], decision.insert_size, r1.rb <= r2.rb);
    } else {
        link_unpaired_mates(&mut recs1, &mut recs2);
    }

    (recs1, recs2)
}

fn link_mates(rec1: &mut AlignRecord, rec2: &mut AlignRecord, insert_size: i64, rec1_is_leftmost: bool) {
    rec1.mtid = rec2.rid;
    rec1.mpos = rec2.local_pos;
    rec2.mtid = rec1.rid;
    rec2.mpos = rec1.local_pos;

    if rec2.flags & flags::REVERSE != 0 {
        rec1.flags |= flags::MATE_REVERSE;
    }
    if rec1.flags & flags::REVERSE != 0 {
        rec2.flags |= flags::MATE_REVERSE;
    }

    let tlen = insert_size.max(1);
    rec1.tlen = if rec1_is_leftmost { tlen } else { -tlen };
    rec2.tlen = -rec1.tlen;

    rec1.aux.mc = Some(rec2.cigar.clone());
    rec2.aux.mc = Some(rec1.cigar.clone());
}

fn link_unpaired_mates(recs1: &mut [AlignRecord], recs2: &mut [AlignRecord]) {
    if let (Some(rec1), Some(rec2)) = (recs1.first_mut(), recs2.first_mut()) {
        if rec1.is_unmapped() {
            rec1.rid = rec2.rid;
            rec1.local_pos = rec2.local_pos;
        }
        if rec2.is_unmapped() {
            rec2.rid = rec1.rid;
            rec2.local_pos = rec1.local_pos;
        }
        if rec1.is_unmapped() {
            rec2.flags |= flags::MATE_UNMAPPED;
        }
        if rec2.is_unmapped() {
            rec1.flags |= flags::MATE_UNMAPPED;
        }
        rec1.mtid = rec2.rid;
        rec1.mpos = rec2.local_pos;
        rec2.mtid = rec1.rid;
        rec2.mpos = rec1.local_pos;
    }
}

/// §5/§7: the one place an error actually propagates — output sink failure
/// aborts the whole batch.
fn write_record<W: Write>(out: &mut W, rec: &AlignRecord, collaborator: &(impl ReferenceSource + ?Sized)) -> crate::errors::Result<()> {
    let seq_ascii = String::from_utf8_lossy(&rec.seq).into_owned();
    let qual_ascii = String::from_utf8_lossy(&rec.qual).into_owned();
    // XA suppression was already decided in `align_one_read` when it chose
    // whether to attach `aux.xa` at all; don't re-apply the cap here.
    let line = rec.to_sam_line(
        |rid| collaborator.contig_name(rid as usize).map(|s| s.to_string()),
        &seq_ascii,
        &qual_ascii,
        usize::MAX,
        usize::MAX,
        0,
        0,
    );
    writeln!(out, "{line}").map_err(|e| {
        warn!("output sink write failed, aborting batch");
        Error::OutputSink(e)
    })
}

/// Emit the SAM header (`@HD`/`@SQ`/`@PG`) the way the teacher's
/// `align_fastq_with_opt` does, ahead of any records.
pub fn write_header<W: Write>(out: &mut W, collaborator: &(impl ReferenceSource + ?Sized)) -> crate::errors::Result<()> {
    writeln!(out, "@HD\tVN:1.6\tSO:unsorted").map_err(Error::Io)?;
    for rid in 0..collaborator.num_contigs() {
        if let Some(name) = collaborator.contig_name(rid) {
            writeln!(out, "@SQ\tSN:{name}\tLN:{}", collaborator.contig_len(rid)).map_err(Error::Io)?;
        }
    }
    writeln!(out, "@PG\tID:memalign-core\tPN:memalign-core\tVN:{}", env!("CARGO_PKG_VERSION")).map_err(Error::Io)?;
    Ok(())
}
