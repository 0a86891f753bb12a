//! Input and output boundaries of the pipeline.
//!
//! A [`CallStore`] produces the sparse call matrix of a task unit, a
//! [`SegmentSink`] receives finished chromosomes. In-memory implementations
//! live next to the TSV ones for tests and embedding.

mod memory;
mod tsv;
mod write;

use arcstr::ArcStr;
pub use memory::{
    MemorySink,
    MemoryStore,
};
pub use tsv::{
    CallRow,
    TsvCallStore,
};
pub use write::SegmentWriter;

use crate::data_structs::{
    SegmentCall,
    SparseCallMatrix,
    TaskFailure,
    TaskUnit,
};

/// Source of read-level methylation calls.
///
/// Loads may run concurrently from several reader threads.
pub trait CallStore: Send + Sync {
    /// Calls of a whole chromosome or of the `[start, end)` window of a unit.
    fn load(
        &self,
        unit: &TaskUnit,
    ) -> anyhow::Result<SparseCallMatrix>;
}

/// Destination of segmentation results. Called from the collecting thread
/// only, once per chromosome in work-list order.
pub trait SegmentSink {
    fn write_calls(
        &mut self,
        chrom: &ArcStr,
        calls: &[SegmentCall],
    ) -> anyhow::Result<()>;

    /// Records a unit that produced no calls.
    fn write_failure(
        &mut self,
        failure: &TaskFailure,
    ) -> anyhow::Result<()>;
}
