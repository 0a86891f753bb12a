use itertools::Itertools;
use log::debug;
use ndarray::Array2;

use crate::data_structs::typedef::{
    PosType,
    SampleId,
};
use crate::data_structs::{
    SampleIndex,
    SparseCallMatrix,
};
use crate::error::{
    Result,
    SegmentationError,
};
use crate::utils::llr_to_prob;

/// Reads × positions methylation probabilities in compressed column form.
///
/// Only observed calls are stored, a missing call has no value.
#[derive(Debug, Clone)]
pub struct ProbabilityMatrix {
    n_reads: usize,
    col_ptr: Vec<usize>,
    calls:   Vec<(usize, f64)>,
}

impl ProbabilityMatrix {
    fn from_sparse(matrix: &SparseCallMatrix) -> Self {
        let mut col_ptr = vec![0; matrix.n_positions() + 1];
        let mut calls = Vec::with_capacity(matrix.nnz());

        // Entries are sorted by column, then read
        for entry in matrix.entries() {
            col_ptr[entry.col as usize + 1] += 1;
            calls.push((entry.read as usize, llr_to_prob(entry.llr as f64)));
        }
        for i in 1..col_ptr.len() {
            col_ptr[i] += col_ptr[i - 1];
        }

        Self {
            n_reads: matrix.n_reads(),
            col_ptr,
            calls,
        }
    }

    pub fn n_reads(&self) -> usize {
        self.n_reads
    }

    pub fn n_positions(&self) -> usize {
        self.col_ptr.len() - 1
    }

    /// Total number of observed calls.
    pub fn n_calls(&self) -> usize {
        self.calls.len()
    }

    pub fn get(
        &self,
        read: usize,
        pos: usize,
    ) -> Option<f64> {
        if pos >= self.n_positions() {
            return None;
        }
        let observed = self.observed(pos);
        observed
            .binary_search_by_key(&read, |(r, _)| *r)
            .ok()
            .map(|idx| observed[idx].1)
    }

    /// Observed `(read, probability)` pairs at a position, ordered by read.
    pub fn observed(
        &self,
        pos: usize,
    ) -> &[(usize, f64)] {
        &self.calls[self.col_ptr[pos]..self.col_ptr[pos + 1]]
    }
}

/// Output of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub probs:      ProbabilityMatrix,
    pub samples:    SampleIndex,
    /// Dense sample id of every read.
    pub sample_ids: Vec<SampleId>,
    pub positions:  Vec<PosType>,
}

impl Preprocessed {
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Observed calls per position and sample, `positions × samples`.
    pub fn call_counts(&self) -> Array2<f64> {
        let mut counts =
            Array2::zeros((self.probs.n_positions(), self.n_samples()));
        for pos in 0..self.probs.n_positions() {
            for &(read, _) in self.probs.observed(pos) {
                counts[[pos, self.sample_ids[read]]] += 1.0;
            }
        }
        counts
    }
}

/// Converts a sparse LLR matrix into methylation probabilities and a sample
/// index.
pub fn preprocess(matrix: &SparseCallMatrix) -> Result<Preprocessed> {
    validate_matrix(matrix)?;

    let probs = ProbabilityMatrix::from_sparse(matrix);
    let (samples, sample_ids) = SampleIndex::from_read_samples(matrix.read_samples());
    debug!(
        "Preprocessed matrix: {} reads, {} positions, {} calls, {} samples",
        probs.n_reads(),
        probs.n_positions(),
        probs.n_calls(),
        samples.len()
    );

    Ok(Preprocessed {
        probs,
        samples,
        sample_ids,
        positions: matrix.positions().to_vec(),
    })
}

fn validate_matrix(matrix: &SparseCallMatrix) -> Result<()> {
    if matrix.n_reads() == 0 {
        return Err(SegmentationError::malformed("matrix has no reads"));
    }
    if matrix.n_positions() == 0 {
        return Err(SegmentationError::malformed("matrix has no positions"));
    }
    if matrix.read_samples().len() != matrix.n_reads() {
        return Err(SegmentationError::malformed(format!(
            "{} sample labels for {} reads",
            matrix.read_samples().len(),
            matrix.n_reads()
        )));
    }
    if let Some((a, b)) = matrix
        .positions()
        .iter()
        .tuple_windows()
        .find(|(a, b)| a >= b)
    {
        return Err(SegmentationError::malformed(format!(
            "positions are not strictly increasing ({} followed by {})",
            a, b
        )));
    }
    for entry in matrix.entries() {
        if entry.read as usize >= matrix.n_reads()
            || entry.col as usize >= matrix.n_positions()
        {
            return Err(SegmentationError::malformed(format!(
                "entry ({}, {}) out of bounds for a {}x{} matrix",
                entry.read,
                entry.col,
                matrix.n_reads(),
                matrix.n_positions()
            )));
        }
        if entry.llr.is_nan() {
            return Err(SegmentationError::malformed(format!(
                "NaN llr for read {} at position {}",
                entry.read,
                matrix.positions()[entry.col as usize]
            )));
        }
    }
    if let Some((dup, _)) = matrix
        .entries()
        .iter()
        .tuple_windows()
        .find(|(a, b)| a.col == b.col && a.read == b.read)
    {
        return Err(SegmentationError::malformed(format!(
            "duplicated call for read {} at position {}",
            dup.read,
            matrix.positions()[dup.col as usize]
        )));
    }
    Ok(())
}
