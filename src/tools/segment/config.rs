use serde::{
    Deserialize,
    Serialize,
};

use crate::error::{
    Result,
    SegmentationError,
};
use crate::with_field_fn;

/// Initial emission parameters of the HMM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmissionPrior {
    /// Every state and sample starts at the same probability.
    Uniform(f64),
    /// Positions are split into `max_segments` contiguous chunks of equal
    /// size, each state starts at the per-sample mean of its chunk.
    ChunkMeans,
    /// One starting probability per state, shared by all samples.
    Explicit(Vec<f64>),
}

impl Default for EmissionPrior {
    fn default() -> Self {
        Self::ChunkMeans
    }
}

/// Parameters of a single segmentation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Upper bound on the number of hidden states per task unit.
    pub max_segments:          usize,
    pub t_stay:                f64,
    pub t_move:                f64,
    /// Share of `t_move` going to the next state, the rest goes to the
    /// previous one. `1.0` gives a left-to-right chain.
    pub forward_fraction:      f64,
    /// Baum-Welch stops once the log-likelihood improves by less than this.
    pub tol:                   f64,
    pub max_iterations:        usize,
    /// Adjacent segments closer than this (max absolute per-sample
    /// difference) are merged.
    pub min_parameter_diff:    f64,
    /// Label runs spanning fewer positions are folded into their closer
    /// neighbour before merging. `1` disables folding.
    pub min_segment_positions: usize,
    /// Floor added to every transition and emission term.
    pub eps:                   f64,
    pub prior:                 EmissionPrior,
}

impl SegmentationConfig {
    with_field_fn!(max_segments, usize);
    with_field_fn!(t_stay, f64);
    with_field_fn!(t_move, f64);
    with_field_fn!(forward_fraction, f64);
    with_field_fn!(tol, f64);
    with_field_fn!(max_iterations, usize);
    with_field_fn!(min_parameter_diff, f64);
    with_field_fn!(min_segment_positions, usize);
    with_field_fn!(eps, f64);
    with_field_fn!(prior, EmissionPrior);

    pub fn validate(&self) -> Result<()> {
        let unit_interval = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            }
            else {
                Err(SegmentationError::config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )))
            }
        };

        if self.max_segments < 1 {
            return Err(SegmentationError::config(
                "max_segments must be at least 1",
            ));
        }
        unit_interval("t_stay", self.t_stay)?;
        unit_interval("t_move", self.t_move)?;
        unit_interval("forward_fraction", self.forward_fraction)?;
        if self.t_stay + self.t_move + self.eps <= 0.0 {
            return Err(SegmentationError::config(
                "transition rows cannot be normalized: t_stay, t_move and eps are all zero",
            ));
        }
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(SegmentationError::config(format!(
                "tol must be a positive number, got {}",
                self.tol
            )));
        }
        if self.max_iterations < 1 {
            return Err(SegmentationError::config(
                "max_iterations must be at least 1",
            ));
        }
        if !(self.min_parameter_diff >= 0.0) {
            return Err(SegmentationError::config(format!(
                "min_parameter_diff must be non-negative, got {}",
                self.min_parameter_diff
            )));
        }
        if self.min_segment_positions < 1 {
            return Err(SegmentationError::config(
                "min_segment_positions must be at least 1",
            ));
        }
        if !(self.eps >= 0.0 && self.eps < 1.0) {
            return Err(SegmentationError::config(format!(
                "eps must be in [0, 1), got {}",
                self.eps
            )));
        }
        match &self.prior {
            EmissionPrior::Uniform(p) => unit_interval("uniform prior", *p)?,
            EmissionPrior::Explicit(values) => {
                if values.len() != self.max_segments {
                    return Err(SegmentationError::config(format!(
                        "explicit prior has {} values for {} segments",
                        values.len(),
                        self.max_segments
                    )));
                }
                values
                    .iter()
                    .try_for_each(|p| unit_interval("explicit prior", *p))?;
            },
            EmissionPrior::ChunkMeans => {},
        }
        Ok(())
    }

    pub fn from_json<R: std::io::Read>(reader: R) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_segments:          10,
            t_stay:                0.1,
            t_move:                0.8,
            forward_fraction:      1.0,
            tol:                   (-8f64).exp(),
            max_iterations:        100,
            min_parameter_diff:    0.2,
            min_segment_positions: 3,
            eps:                   (-512f64).exp(),
            prior:                 EmissionPrior::default(),
        }
    }
}
