use anyhow::bail;
use arcstr::ArcStr;
use hashbrown::HashMap;
use itertools::Itertools;

use super::typedef::{
    LlrType,
    PosType,
};

/// A single observed read call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallEntry {
    /// Row (read) index.
    pub read: u32,
    /// Column (position) index.
    pub col:  u32,
    pub llr:  LlrType,
}

impl CallEntry {
    pub fn new(
        read: u32,
        col: u32,
        llr: LlrType,
    ) -> Self {
        Self { read, col, llr }
    }
}

/// Sparse reads × positions matrix of methylation LLRs for one task unit.
///
/// A missing entry means the read does not cover the position, which is
/// different from an LLR of zero. Entries are kept sorted by position, then
/// read. The matrix is not validated on construction; see
/// [`preprocess`](crate::tools::segment::preprocess).
#[derive(Debug, Clone, PartialEq)]
pub struct SparseCallMatrix {
    n_reads:      usize,
    read_samples: Vec<ArcStr>,
    positions:    Vec<PosType>,
    entries:      Vec<CallEntry>,
}

impl SparseCallMatrix {
    pub fn new(
        read_samples: Vec<ArcStr>,
        positions: Vec<PosType>,
        entries: Vec<CallEntry>,
    ) -> Self {
        Self::from_parts(read_samples.len(), read_samples, positions, entries)
    }

    /// Creates a matrix with an explicit row count, which may disagree with
    /// the number of sample labels.
    pub fn from_parts(
        n_reads: usize,
        read_samples: Vec<ArcStr>,
        positions: Vec<PosType>,
        mut entries: Vec<CallEntry>,
    ) -> Self {
        entries.sort_by_key(|e| (e.col, e.read));
        Self {
            n_reads,
            read_samples,
            positions,
            entries,
        }
    }

    pub fn n_reads(&self) -> usize {
        self.n_reads
    }

    pub fn n_positions(&self) -> usize {
        self.positions.len()
    }

    /// Number of observed calls.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Sample name of every row.
    pub fn read_samples(&self) -> &[ArcStr] {
        &self.read_samples
    }

    /// Genomic coordinate of every column.
    pub fn positions(&self) -> &[PosType] {
        &self.positions
    }

    pub fn entries(&self) -> &[CallEntry] {
        &self.entries
    }

    pub fn get(
        &self,
        read: usize,
        col: usize,
    ) -> Option<LlrType> {
        self.entries
            .binary_search_by_key(&(col as u32, read as u32), |e| (e.col, e.read))
            .ok()
            .map(|idx| self.entries[idx].llr)
    }
}

/// Accumulates read-level calls into a [`SparseCallMatrix`].
///
/// Rows are assigned in order of first appearance of a read name, columns
/// are the sorted distinct positions.
#[derive(Debug, Default)]
pub struct SparseCallMatrixBuilder {
    read_ids:     HashMap<String, u32>,
    samples:      HashMap<String, ArcStr>,
    read_samples: Vec<ArcStr>,
    calls:        Vec<(u32, PosType, LlrType)>,
}

impl SparseCallMatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        read_name: &str,
        sample: &str,
        position: PosType,
        llr: LlrType,
    ) -> anyhow::Result<()> {
        let sample = self
            .samples
            .entry_ref(sample)
            .or_insert_with(|| ArcStr::from(sample))
            .clone();

        let read = match self.read_ids.get(read_name) {
            Some(&read) => {
                let known = &self.read_samples[read as usize];
                if known != &sample {
                    bail!(
                        "Read {} assigned to samples {} and {}",
                        read_name,
                        known,
                        sample
                    )
                }
                read
            },
            None => {
                let read = self.read_samples.len() as u32;
                self.read_ids.insert(read_name.to_string(), read);
                self.read_samples.push(sample);
                read
            },
        };
        self.calls.push((read, position, llr));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn build(self) -> SparseCallMatrix {
        let positions = self
            .calls
            .iter()
            .map(|(_, pos, _)| *pos)
            .sorted_unstable()
            .dedup()
            .collect_vec();
        let entries = self
            .calls
            .into_iter()
            .map(|(read, pos, llr)| {
                // Every position is present by construction
                let col = positions.partition_point(|p| *p < pos) as u32;
                CallEntry::new(read, col, llr)
            })
            .collect_vec();
        SparseCallMatrix::new(self.read_samples, positions, entries)
    }
}
