//! §4.9 insert-size estimation: build a per-orientation distribution from a
//! sample of concordant, high-confidence pairs collected from the start of
//! the run, then reuse it read-only for the rest of the batch.

use crate::model::{InsertSizeDistribution, Orientation};

pub struct SizeSample {
    pub orientation: Orientation,
    pub insert_size: i64,
}

/// Classify mate orientation from each mate's forward-strand leftmost
/// position and strand, the way BWA-MEM's `mem_pestat` does: same strand is
/// FF/RR, opposite strand is FR/RF depending on which one is upstream.
pub fn classify_orientation(pos1: i64, is_rev1: bool, pos2: i64, is_rev2: bool) -> Orientation {
    if is_rev1 == is_rev2 {
        if is_rev1 {
            Orientation::Rr
        } else {
            Orientation::Ff
        }
    } else {
        let (fwd_pos, rev_pos) = if !is_rev1 { (pos1, pos2) } else { (pos2, pos1) };
        if fwd_pos <= rev_pos {
            Orientation::Fr
        } else {
            Orientation::Rf
        }
    }
}

/// §4.9: per-orientation, require at least 25 samples or mark `failed`.
/// Otherwise filter to `[Q25-2*IQR, Q75+2*IQR]` before taking mean/stddev.
pub fn estimate(samples: &[SizeSample]) -> InsertSizeDistribution {
    let mut dist = InsertSizeDistribution::default();

    for &o in &Orientation::ALL {
        let mut sizes: Vec<i64> = samples.iter().filter(|s| s.orientation == o).map(|s| s.insert_size).collect();
        let stats = dist.stats_mut(o);
        stats.count = sizes.len() as i32;

        if sizes.len() < 25 {
            stats.failed = true;
            continue;
        }

        sizes.sort_unstable();
        let q25 = percentile(&sizes, 0.25);
        let q75 = percentile(&sizes, 0.75);
        let iqr = q75 - q25;
        let lo = q25 - 2.0 * iqr;
        let hi = q75 + 2.0 * iqr;

        let filtered: Vec<f64> = sizes.iter().map(|&v| v as f64).filter(|&v| v >= lo && v <= hi).collect();
        let n = filtered.len().max(1) as f64;
        let mean = filtered.iter().sum::<f64>() / n;
        let var = filtered.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        stats.mean = mean;
        stats.stddev = var.sqrt();
        stats.proper_low = lo.max(0.0) as i64;
        stats.proper_high = hi as i64;
        stats.failed = false;
    }

    dist.primary_orientation = Orientation::ALL
        .iter()
        .copied()
        .filter(|&o| !dist.stats(o).failed)
        .max_by_key(|&o| dist.stats(o).count);

    dist
}

fn percentile(sorted: &[i64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo] as f64
    } else {
        let frac = idx - lo as f64;
        sorted[lo] as f64 * (1.0 - frac) + sorted[hi] as f64 * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fr_when_forward_mate_upstream() {
        assert_eq!(classify_orientation(100, false, 400, true), Orientation::Fr);
    }

    #[test]
    fn classifies_rf_when_reverse_mate_upstream() {
        assert_eq!(classify_orientation(400, false, 100, true), Orientation::Rf);
    }

    #[test]
    fn classifies_same_strand_as_ff_or_rr() {
        assert_eq!(classify_orientation(100, false, 400, false), Orientation::Ff);
        assert_eq!(classify_orientation(100, true, 400, true), Orientation::Rr);
    }

    #[test]
    fn below_threshold_sample_count_marks_failed() {
        let samples: Vec<SizeSample> = (0..10)
            .map(|i| SizeSample { orientation: Orientation::Fr, insert_size: 300 + i })
            .collect();
        let dist = estimate(&samples);
        assert!(dist.stats(Orientation::Fr).failed);
        assert!(dist.primary_orientation.is_none());
    }

    #[test]
    fn sufficient_fr_samples_yield_distribution_near_synthetic_parameters() {
        let samples: Vec<SizeSample> = (0..26)
            .map(|k| SizeSample { orientation: Orientation::Fr, insert_size: 225 + 6 * k })
            .collect();
        let dist = estimate(&samples);
        let stats = dist.stats(Orientation::Fr);
        assert!(!stats.failed);
        assert_eq!(dist.primary_orientation, Some(Orientation::Fr));
        assert!((stats.mean - 300.0).abs() < 20.0, "mean={}", stats.mean);
        assert!((stats.stddev - 45.0).abs() < 20.0, "stddev={}", stats.stddev);
    }
}
