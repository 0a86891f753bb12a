use std::collections::BTreeMap;

use arcstr::ArcStr;
use serde::{
    Deserialize,
    Serialize,
};

use super::typedef::{
    LabelType,
    PosType,
};

/// Mean methylation probability of one sample within a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStat {
    pub mean:    f64,
    /// Number of read calls the mean is computed from.
    pub n_calls: usize,
}

impl SampleStat {
    pub fn new(
        mean: f64,
        n_calls: usize,
    ) -> Self {
        Self { mean, n_calls }
    }

    /// Call-weighted combination of two statistics.
    pub fn combine(
        &self,
        other: &Self,
    ) -> Self {
        let n_calls = self.n_calls + other.n_calls;
        let mean = if n_calls == 0 {
            (self.mean + other.mean) / 2.0
        }
        else {
            (self.mean * self.n_calls as f64 + other.mean * other.n_calls as f64)
                / n_calls as f64
        };
        Self { mean, n_calls }
    }
}

/// A segment of homogeneous methylation, the externally visible output.
///
/// Coordinates are half-open: `end` is one past the last position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCall {
    pub chrom:       ArcStr,
    pub start:       PosType,
    pub end:         PosType,
    pub label:       LabelType,
    /// Per-sample statistics, keyed by sample name. Samples without calls
    /// in the segment are absent.
    pub samples:     BTreeMap<String, SampleStat>,
    pub n_positions: usize,
    /// Distinct reads with at least one call in the segment.
    pub n_reads:     usize,
}

impl SegmentCall {
    pub fn length(&self) -> PosType {
        self.end - self.start
    }

    pub fn mean(
        &self,
        sample: &str,
    ) -> Option<f64> {
        self.samples.get(sample).map(|s| s.mean)
    }

    /// Maximum absolute difference of the per-sample means.
    ///
    /// Only samples present in both calls are compared. Two calls without
    /// any sample data are at distance 0, calls with no sample in common are
    /// infinitely far apart.
    pub fn mean_distance(
        &self,
        other: &Self,
    ) -> f64 {
        if self.samples.is_empty() && other.samples.is_empty() {
            return 0.0;
        }
        self.samples
            .iter()
            .filter_map(|(name, stat)| {
                other
                    .samples
                    .get(name)
                    .map(|o| (stat.mean - o.mean).abs())
            })
            .reduce(f64::max)
            .unwrap_or(f64::INFINITY)
    }

    /// Joins a downstream call into this one. The label of `self` is kept.
    pub fn merge(
        mut self,
        other: SegmentCall,
    ) -> SegmentCall {
        debug_assert!(self.chrom == other.chrom && self.end <= other.start);
        for (name, stat) in other.samples {
            self.samples
                .entry(name)
                .and_modify(|s| *s = s.combine(&stat))
                .or_insert(stat);
        }
        self.end = other.end;
        self.n_positions += other.n_positions;
        self.n_reads += other.n_reads;
        self
    }
}
