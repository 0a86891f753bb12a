//! Error types of the segmentation engine.
//!
//! The engine reports typed errors so the pipeline can tell a malformed task
//! unit apart from a degenerate one. Everything around the engine (stores,
//! sinks, orchestration) works with [`anyhow::Result`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    /// Input matrix shape or consistency violated.
    #[error("Malformed matrix: {0}")]
    MalformedMatrix(String),

    /// Invalid parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A forward/backward scaling factor vanished.
    #[error("Numerical instability at position {position}: {message}")]
    NumericalInstability { position: usize, message: String },
}

pub type Result<T> = std::result::Result<T, SegmentationError>;

impl SegmentationError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMatrix(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn instability(
        position: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::NumericalInstability {
            position,
            message: message.into(),
        }
    }
}
