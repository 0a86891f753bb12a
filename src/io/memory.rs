use anyhow::anyhow;
use arcstr::ArcStr;
use hashbrown::HashMap;

use super::{
    CallStore,
    SegmentSink,
};
use crate::data_structs::{
    SegmentCall,
    SparseCallMatrix,
    TaskFailure,
    TaskUnit,
};

/// Store backed by prebuilt matrices, keyed by unit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    matrices: HashMap<TaskUnit, SparseCallMatrix>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        unit: TaskUnit,
        matrix: SparseCallMatrix,
    ) -> Option<SparseCallMatrix> {
        self.matrices.insert(unit, matrix)
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

impl FromIterator<(TaskUnit, SparseCallMatrix)> for MemoryStore {
    fn from_iter<T: IntoIterator<Item = (TaskUnit, SparseCallMatrix)>>(iter: T) -> Self {
        Self {
            matrices: iter.into_iter().collect(),
        }
    }
}

impl CallStore for MemoryStore {
    fn load(
        &self,
        unit: &TaskUnit,
    ) -> anyhow::Result<SparseCallMatrix> {
        self.matrices
            .get(unit)
            .cloned()
            .ok_or_else(|| anyhow!("No matrix stored for {}", unit))
    }
}

/// Sink collecting everything it receives.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub calls:    Vec<SegmentCall>,
    pub failures: Vec<TaskFailure>,
    /// Chromosomes in the order they were written.
    pub chroms:   Vec<ArcStr>,
}

impl SegmentSink for MemorySink {
    fn write_calls(
        &mut self,
        chrom: &ArcStr,
        calls: &[SegmentCall],
    ) -> anyhow::Result<()> {
        self.chroms.push(chrom.clone());
        self.calls.extend_from_slice(calls);
        Ok(())
    }

    fn write_failure(
        &mut self,
        failure: &TaskFailure,
    ) -> anyhow::Result<()> {
        self.failures.push(failure.clone());
        Ok(())
    }
}
