use serde::{
    Deserialize,
    Serialize,
};

use crate::error::{
    Result,
    SegmentationError,
};
use crate::utils::n_threads;
use crate::with_field_fn;

/// Thread and queue layout of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Compute workers.
    pub n_worker:       usize,
    /// Store readers.
    pub n_reader:       usize,
    /// Capacity of the bounded channels between stages.
    pub queue_capacity: usize,
    /// Cancel the run on the first failed unit.
    pub fail_fast:      bool,
}

impl PipelineConfig {
    with_field_fn!(n_worker, usize);
    with_field_fn!(n_reader, usize);
    with_field_fn!(queue_capacity, usize);
    with_field_fn!(fail_fast, bool);

    pub fn validate(&self) -> Result<()> {
        if self.n_worker < 1 {
            return Err(SegmentationError::config("n_worker must be at least 1"));
        }
        if self.n_reader < 1 {
            return Err(SegmentationError::config("n_reader must be at least 1"));
        }
        if self.queue_capacity < 1 {
            return Err(SegmentationError::config(
                "queue_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let n_worker = n_threads();
        Self {
            n_worker,
            n_reader: 1,
            queue_capacity: n_worker * 2,
            fail_fast: false,
        }
    }
}
