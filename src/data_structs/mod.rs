//! Core data structures of the segmentation engine.
//!
//! - [`SparseCallMatrix`]: read × position methylation LLRs of one task unit,
//!   as produced by a [`CallStore`](crate::io::CallStore).
//! - [`SampleIndex`]: dense integer ids for the sample names of a task unit.
//! - [`TaskUnit`] and [`TaskFailure`]: the unit of parallel work and the
//!   explicit record written when it fails.
//! - [`SegmentCall`]: the final segment record handed to a sink.
//! - [`typedef`]: type aliases for positions, LLRs, labels and sample ids.

mod matrix;
mod sample_index;
mod segment_call;
mod task;
pub mod typedef;

pub use matrix::{
    CallEntry,
    SparseCallMatrix,
    SparseCallMatrixBuilder,
};
pub use sample_index::SampleIndex;
pub use segment_call::{
    SampleStat,
    SegmentCall,
};
pub use task::{
    FailureKind,
    TaskFailure,
    TaskUnit,
};
