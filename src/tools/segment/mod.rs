//! Joint multi-sample segmentation of one task unit.
//!
//! The stages run in order: LLRs are turned into probabilities
//! ([`preprocess`]), a Bernoulli emission HMM is trained with Baum-Welch and
//! decoded per position ([`SegmentationHmm`]), and adjacent segments with
//! similar parameters are merged ([`cleanup_segmentation`]).

mod cleanup;
pub mod config;
mod emission;
mod hmm;
mod preprocess;

use arcstr::ArcStr;
pub use cleanup::{
    cleanup_segmentation,
    fold_short_runs,
    label_runs,
    merge_runs,
    Run,
};
pub use config::{
    EmissionPrior,
    SegmentationConfig,
};
pub use emission::BernoulliPosterior;
pub use hmm::{
    ForwardBackward,
    HmmState,
    SegmentationHmm,
    TrainedHmm,
};
use log::debug;
pub use preprocess::{
    preprocess,
    Preprocessed,
    ProbabilityMatrix,
};

use crate::data_structs::{
    SegmentCall,
    SparseCallMatrix,
};
use crate::error::Result;

/// Segments a single task unit.
///
/// Calls are returned in coordinate order and tile the covered positions
/// without gaps or overlaps.
pub fn segment(
    matrix: &SparseCallMatrix,
    config: &SegmentationConfig,
    chrom: &ArcStr,
) -> Result<Vec<SegmentCall>> {
    let hmm = SegmentationHmm::new(config)?;
    let data = preprocess(matrix)?;

    let trained = hmm.baum_welch(&data)?;
    debug!(
        "{}: Baum-Welch finished after {} iterations (converged: {}, log-likelihood {:.4})",
        chrom, trained.iterations, trained.converged, trained.log_likelihood
    );

    let labels = SegmentationHmm::map(trained.posterior.view());
    Ok(cleanup_segmentation(
        chrom,
        &labels,
        &trained.state.emission,
        &data,
        config.min_segment_positions,
        config.min_parameter_diff,
    ))
}
