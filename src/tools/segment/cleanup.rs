use std::collections::BTreeMap;

use arcstr::ArcStr;
use hashbrown::HashSet;
use itertools::Itertools;
use log::debug;
use ndarray::{
    s,
    Array2,
    Axis,
};

use super::emission::BernoulliPosterior;
use super::preprocess::Preprocessed;
use crate::data_structs::typedef::LabelType;
use crate::data_structs::{
    SampleStat,
    SegmentCall,
};

/// A maximal run of positions sharing one label.
///
/// `start..end` are position indices within the task unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub label:   LabelType,
    pub start:   usize,
    pub end:     usize,
    /// Per-sample methylation parameters of the run.
    pub params:  Vec<f64>,
    /// Per-sample number of calls backing `params`.
    pub weights: Vec<f64>,
}

impl Run {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Maximum absolute per-sample parameter difference.
    pub fn distance(
        &self,
        other: &Run,
    ) -> f64 {
        self.params
            .iter()
            .zip(other.params.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    fn absorb(
        &mut self,
        other: Run,
    ) {
        for (i, (param, weight)) in self
            .params
            .iter_mut()
            .zip(self.weights.iter_mut())
            .enumerate()
        {
            let (other_param, other_weight) = (other.params[i], other.weights[i]);
            let total = *weight + other_weight;
            *param = if total > 0.0 {
                (*param * *weight + other_param * other_weight) / total
            }
            else {
                (*param + other_param) / 2.0
            };
            *weight = total;
        }
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
    }
}

/// Splits a labelling into runs carrying the emission parameters of their
/// label and the coverage they are backed by.
pub fn label_runs(
    labels: &[LabelType],
    emission: &BernoulliPosterior,
    call_counts: &Array2<f64>,
) -> Vec<Run> {
    let chunks = labels.iter().chunk_by(|label| **label);
    let mut start = 0;
    let runs = chunks
        .into_iter()
        .map(|(label, group)| {
            let end = start + group.count();
            let weights = call_counts
                .slice(s![start..end, ..])
                .sum_axis(Axis(0))
                .to_vec();
            let run = Run {
                label,
                start,
                end,
                params: emission.params().row(label).to_vec(),
                weights,
            };
            start = end;
            run
        })
        .collect();
    runs
}

/// Folds runs spanning fewer than `min_positions` positions into their
/// closer neighbour, shortest first. Ties go to the left neighbour and the
/// neighbour keeps its label.
pub fn fold_short_runs(
    mut runs: Vec<Run>,
    min_positions: usize,
) -> Vec<Run> {
    while runs.len() > 1 {
        let Some(idx) = runs
            .iter()
            .enumerate()
            .filter(|(_, run)| run.len() < min_positions)
            .min_by_key(|(_, run)| run.len())
            .map(|(idx, _)| idx)
        else {
            break;
        };
        let short = runs.remove(idx);
        // After removal the right neighbour sits at `idx`
        let target = match (idx.checked_sub(1), idx < runs.len()) {
            (Some(left), true) => {
                if runs[left].distance(&short) <= runs[idx].distance(&short) {
                    left
                }
                else {
                    idx
                }
            },
            (Some(left), false) => left,
            (None, _) => idx,
        };
        runs[target].absorb(short);
    }
    runs
}

/// One left-to-right pass. Returns the new runs and the number of merges.
fn merge_pass(
    runs: Vec<Run>,
    min_parameter_diff: f64,
) -> (Vec<Run>, usize) {
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    let mut n_merges = 0;
    for run in runs {
        match merged.last_mut() {
            Some(current) if current.distance(&run) < min_parameter_diff => {
                current.absorb(run);
                n_merges += 1;
            },
            _ => merged.push(run),
        }
    }
    (merged, n_merges)
}

/// Merges adjacent runs closer than `min_parameter_diff` until no pass
/// merges anything.
pub fn merge_runs(
    runs: Vec<Run>,
    min_parameter_diff: f64,
) -> Vec<Run> {
    let mut current = runs;
    loop {
        let (merged, n_merges) = merge_pass(current, min_parameter_diff);
        current = merged;
        if n_merges == 0 {
            break;
        }
    }
    current
}

/// Collapses a MAP labelling into segment calls. Runs shorter than
/// `min_segment_positions` are folded into a neighbour first, then adjacent
/// runs closer than `min_parameter_diff` are merged.
pub fn cleanup_segmentation(
    chrom: &ArcStr,
    labels: &[LabelType],
    emission: &BernoulliPosterior,
    data: &Preprocessed,
    min_segment_positions: usize,
    min_parameter_diff: f64,
) -> Vec<SegmentCall> {
    let runs = label_runs(labels, emission, &data.call_counts());
    let n_runs = runs.len();
    let runs = fold_short_runs(runs, min_segment_positions);
    let runs = merge_runs(runs, min_parameter_diff);
    debug!(
        "Cleanup on {}: {} label runs merged into {} segments",
        chrom,
        n_runs,
        runs.len()
    );
    runs.iter()
        .map(|run| segment_call(chrom, run, data))
        .collect()
}

/// Summarizes the observed data of a run.
fn segment_call(
    chrom: &ArcStr,
    run: &Run,
    data: &Preprocessed,
) -> SegmentCall {
    let n_samples = data.n_samples();
    let mut sums = vec![0.0; n_samples];
    let mut counts = vec![0usize; n_samples];
    let mut reads = HashSet::new();

    for pos in run.start..run.end {
        for &(read, p) in data.probs.observed(pos) {
            let sample = data.sample_ids[read];
            sums[sample] += p;
            counts[sample] += 1;
            reads.insert(read);
        }
    }

    let samples: BTreeMap<String, SampleStat> = (0..n_samples)
        .filter(|s| counts[*s] > 0)
        .filter_map(|s| {
            data.samples.name(s).map(|name| {
                (
                    name.to_string(),
                    SampleStat::new(sums[s] / counts[s] as f64, counts[s]),
                )
            })
        })
        .collect();

    SegmentCall {
        chrom: chrom.clone(),
        start: data.positions[run.start],
        end: data.positions[run.end - 1] + 1,
        label: run.label,
        samples,
        n_positions: run.len(),
        n_reads: reads.len(),
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::array;
    use rstest::*;

    use super::*;

    fn run(
        label: LabelType,
        start: usize,
        end: usize,
        params: &[f64],
        weights: &[f64],
    ) -> Run {
        Run {
            label,
            start,
            end,
            params: params.to_vec(),
            weights: weights.to_vec(),
        }
    }

    #[fixture]
    fn runs() -> Vec<Run> {
        vec![
            run(0, 0, 10, &[0.9, 0.1], &[20.0, 20.0]),
            run(1, 10, 15, &[0.85, 0.15], &[10.0, 0.0]),
            run(2, 15, 30, &[0.2, 0.1], &[30.0, 30.0]),
            run(3, 30, 31, &[0.32, 0.05], &[0.0, 0.0]),
        ]
    }

    #[test]
    fn test_label_runs() {
        let emission = BernoulliPosterior::new(array![[0.9], [0.1], [0.5]]);
        let counts = array![[2.0], [1.0], [0.0], [3.0], [1.0]];
        let runs = label_runs(&[0, 0, 2, 2, 0], &emission, &counts);
        assert_eq!(runs.len(), 3);
        assert_eq!((runs[0].start, runs[0].end), (0, 2));
        assert_eq!(runs[0].weights, vec![3.0]);
        assert_eq!(runs[1].label, 2);
        assert_eq!(runs[1].params, vec![0.5]);
        assert_eq!((runs[2].start, runs[2].end), (4, 5));
    }

    #[rstest]
    fn test_merge_runs(runs: Vec<Run>) {
        let merged = merge_runs(runs, 0.2);
        assert_eq!(merged.len(), 2);

        assert_eq!(merged[0].label, 0);
        assert_eq!((merged[0].start, merged[0].end), (0, 15));
        assert_approx_eq!(merged[0].params[0], (0.9 * 20.0 + 0.85 * 10.0) / 30.0);
        // Sample 2 carries no weight in the second run
        assert_approx_eq!(merged[0].params[1], 0.1);

        assert_eq!(merged[1].label, 2);
        assert_eq!((merged[1].start, merged[1].end), (15, 31));
        assert_approx_eq!(merged[1].params[0], 0.2);
    }

    #[test]
    fn test_unweighted_mean_without_coverage() {
        let runs = vec![
            run(0, 0, 2, &[0.4], &[0.0]),
            run(1, 2, 4, &[0.5], &[0.0]),
        ];
        let merged = merge_runs(runs, 0.2);
        assert_eq!(merged.len(), 1);
        assert_approx_eq!(merged[0].params[0], 0.45);
    }

    #[rstest]
    fn test_merge_is_idempotent(runs: Vec<Run>) {
        for threshold in [0.0, 0.1, 0.2, 0.7, 1.1] {
            let once = merge_runs(runs.clone(), threshold);
            let (twice, n_merges) = merge_pass(once.clone(), threshold);
            assert_eq!(n_merges, 0);
            assert_eq!(once, twice);
        }
    }

    #[rstest]
    fn test_merge_monotone_in_threshold(runs: Vec<Run>) {
        let counts = [0.0, 0.1, 0.2, 0.7, 1.1]
            .into_iter()
            .map(|t| merge_runs(runs.clone(), t).len())
            .collect_vec();
        assert_eq!(counts, vec![4, 3, 2, 1, 1]);
    }

    #[test]
    fn test_fold_short_runs() {
        // A one-position run at a step goes to the closer side
        let runs = vec![
            run(0, 0, 50, &[0.9, 0.5], &[900.0, 900.0]),
            run(1, 50, 51, &[0.21, 0.26], &[18.0, 18.0]),
            run(2, 51, 100, &[0.1, 0.5], &[880.0, 880.0]),
        ];
        let folded = fold_short_runs(runs.clone(), 3);
        assert_eq!(folded.len(), 2);
        assert_eq!((folded[0].start, folded[0].end), (0, 50));
        assert_eq!(folded[1].label, 2);
        assert_eq!((folded[1].start, folded[1].end), (50, 100));
        assert_approx_eq!(folded[1].params[0], (0.21 * 18.0 + 0.1 * 880.0) / 898.0);

        assert_eq!(fold_short_runs(runs.clone(), 1), runs);
        assert_eq!(merge_runs(fold_short_runs(runs, 3), 0.2).len(), 2);
    }

    #[rstest]
    fn test_fold_short_runs_edges(runs: Vec<Run>) {
        let folded = fold_short_runs(runs, 6);
        assert_eq!(folded.len(), 2);
        assert_eq!((folded[0].start, folded[0].end), (0, 15));
        assert_eq!((folded[1].start, folded[1].end), (15, 31));
        assert!(folded.iter().all(|r| r.len() >= 6));

        let single = fold_short_runs(vec![run(4, 0, 2, &[0.5], &[1.0])], 3);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].label, 4);
    }
}
