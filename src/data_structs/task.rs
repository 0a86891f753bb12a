use std::fmt::Display;

use anyhow::ensure;
use arcstr::ArcStr;
use serde::{
    Deserialize,
    Serialize,
};

use super::typedef::PosType;
use crate::error::SegmentationError;

/// Unit of parallel work: a whole chromosome or a `[start, end)` window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskUnit {
    chrom:  ArcStr,
    window: Option<(PosType, PosType)>,
}

impl TaskUnit {
    pub fn chromosome(chrom: impl Into<ArcStr>) -> Self {
        Self {
            chrom:  chrom.into(),
            window: None,
        }
    }

    pub fn window(
        chrom: impl Into<ArcStr>,
        start: PosType,
        end: PosType,
    ) -> anyhow::Result<Self> {
        let chrom = chrom.into();
        ensure!(
            start <= end,
            "Window {}:{}-{} starts after its end",
            chrom,
            start,
            end
        );
        Ok(Self {
            chrom,
            window: Some((start, end)),
        })
    }

    pub fn chrom(&self) -> &ArcStr {
        &self.chrom
    }

    pub fn bounds(&self) -> Option<(PosType, PosType)> {
        self.window
    }

    /// Start coordinate used to order windows within a chromosome.
    pub fn start(&self) -> PosType {
        self.window.map(|(s, _)| s).unwrap_or(0)
    }
}

impl Display for TaskUnit {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self.window {
            Some((start, end)) => write!(f, "{}:{}-{}", self.chrom, start, end),
            None => write!(f, "{}", self.chrom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    MalformedMatrix,
    NumericalInstability,
    Configuration,
    /// The store could not produce the matrix.
    Store,
    /// The unit panicked twice.
    Crashed,
    /// The run was cancelled before the unit completed.
    Cancelled,
}

impl From<&SegmentationError> for FailureKind {
    fn from(value: &SegmentationError) -> Self {
        match value {
            SegmentationError::MalformedMatrix(_) => Self::MalformedMatrix,
            SegmentationError::NumericalInstability { .. } => {
                Self::NumericalInstability
            },
            SegmentationError::Configuration(_) => Self::Configuration,
        }
    }
}

/// Explicit failure record for a task unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub unit:    TaskUnit,
    pub kind:    FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(
        unit: TaskUnit,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            unit,
            kind,
            message: message.into(),
        }
    }
}

impl Display for TaskFailure {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{} failed ({:?}): {}", self.unit, self.kind, self.message)
    }
}
