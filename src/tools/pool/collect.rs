use arcstr::ArcStr;
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;

use crate::data_structs::{
    FailureKind,
    SegmentCall,
    TaskFailure,
    TaskUnit,
};
use crate::io::SegmentSink;

/// Result of one task unit.
pub type UnitOutcome = Result<Vec<SegmentCall>, TaskFailure>;

/// Everything a pipeline run produced.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Calls in work-list chromosome order, coordinate order within a
    /// chromosome.
    pub calls:    Vec<SegmentCall>,
    pub failures: Vec<TaskFailure>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn n_cancelled(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind == FailureKind::Cancelled)
            .count()
    }
}

/// Joins the outcomes of one chromosome's units.
///
/// `outcomes` must be sorted by window start. The last call of a window and
/// the first call of the next successful window are merged when their sample
/// means differ by less than `min_parameter_diff`. A failed window breaks
/// the chain.
pub fn reassemble(
    outcomes: Vec<(TaskUnit, UnitOutcome)>,
    min_parameter_diff: f64,
) -> (Vec<SegmentCall>, Vec<TaskFailure>) {
    let mut calls: Vec<SegmentCall> = Vec::new();
    let mut failures = Vec::new();
    let mut previous_ok = false;

    for (_, outcome) in outcomes {
        match outcome {
            Ok(window_calls) => {
                let mut window_calls = window_calls.into_iter();
                if let Some(first) = window_calls.next() {
                    match calls.pop() {
                        Some(last)
                            if previous_ok
                                && last.mean_distance(&first) < min_parameter_diff =>
                        {
                            debug!(
                                "Merging window boundary {}:{}-{} with {}-{}",
                                last.chrom, last.start, last.end, first.start, first.end
                            );
                            calls.push(last.merge(first));
                        },
                        Some(last) => {
                            calls.push(last);
                            calls.push(first);
                        },
                        None => calls.push(first),
                    }
                }
                calls.extend(window_calls);
                previous_ok = true;
            },
            Err(failure) => {
                failures.push(failure);
                previous_ok = false;
            },
        }
    }
    (calls, failures)
}

/// Collects unit outcomes in any order and releases whole chromosomes to a
/// sink in work-list order.
pub(crate) struct Collector<'a> {
    units:              &'a [TaskUnit],
    /// Unit indices per chromosome, in order of first appearance.
    groups:             Vec<(ArcStr, Vec<usize>)>,
    outcomes:           Vec<Option<UnitOutcome>>,
    next_group:         usize,
    min_parameter_diff: f64,
    report:             PipelineReport,
}

impl<'a> Collector<'a> {
    pub fn new(
        units: &'a [TaskUnit],
        min_parameter_diff: f64,
    ) -> Self {
        let mut group_idx: HashMap<&ArcStr, usize> = HashMap::new();
        let mut groups: Vec<(ArcStr, Vec<usize>)> = Vec::new();
        for (idx, unit) in units.iter().enumerate() {
            let group = *group_idx.entry(unit.chrom()).or_insert_with(|| {
                groups.push((unit.chrom().clone(), Vec::new()));
                groups.len() - 1
            });
            groups[group].1.push(idx);
        }

        Self {
            units,
            groups,
            outcomes: vec![None; units.len()],
            next_group: 0,
            min_parameter_diff,
            report: PipelineReport::default(),
        }
    }

    pub fn insert(
        &mut self,
        idx: usize,
        outcome: UnitOutcome,
    ) {
        self.outcomes[idx] = Some(outcome);
    }

    /// Marks every unit without an outcome as cancelled.
    pub fn cancel_remaining(&mut self) {
        for (unit, outcome) in self.units.iter().zip(self.outcomes.iter_mut()) {
            if outcome.is_none() {
                *outcome = Some(Err(TaskFailure::new(
                    unit.clone(),
                    FailureKind::Cancelled,
                    "run cancelled before the unit was processed",
                )));
            }
        }
    }

    /// Writes every leading chromosome whose units are all collected.
    /// Returns the number of units released.
    pub fn flush_ready(
        &mut self,
        sink: &mut dyn SegmentSink,
    ) -> anyhow::Result<usize> {
        let mut released = 0;
        while let Some((chrom, indices)) = self.groups.get(self.next_group) {
            if indices.iter().any(|idx| self.outcomes[*idx].is_none()) {
                break;
            }
            let chrom = chrom.clone();
            let outcomes = indices
                .iter()
                .filter_map(|idx| {
                    self.outcomes[*idx]
                        .take()
                        .map(|outcome| (self.units[*idx].clone(), outcome))
                })
                .sorted_by_key(|(unit, _)| unit.start())
                .collect_vec();
            released += outcomes.len();
            self.next_group += 1;

            let (calls, failures) = reassemble(outcomes, self.min_parameter_diff);
            for failure in failures.iter() {
                sink.write_failure(failure)?;
            }
            if !calls.is_empty() {
                sink.write_calls(&chrom, &calls)?;
            }
            debug!(
                "Released {}: {} calls, {} failed units",
                chrom,
                calls.len(),
                failures.len()
            );
            self.report.calls.extend(calls);
            self.report.failures.extend(failures);
        }
        Ok(released)
    }

    pub fn finish(self) -> PipelineReport {
        self.report
    }
}
