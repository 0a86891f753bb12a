use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;

/// Shared cancellation flag of a pipeline run.
///
/// Clones observe the same flag, so a caller can keep one and cancel the run
/// from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
