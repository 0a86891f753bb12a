use log::trace;
use ndarray::{
    Array2,
    ArrayView2,
};

use super::config::EmissionPrior;
use super::preprocess::{
    Preprocessed,
    ProbabilityMatrix,
};
use crate::data_structs::typedef::SampleId;
use crate::utils::clip_prob;

/// Bernoulli emission model with one methylation probability per
/// `(segment, sample)` pair.
///
/// A read with methylation probability `o` agrees with a state of
/// probability `θ` with likelihood `o·θ + (1 - o)·(1 - θ)`; a position's
/// likelihood is the product over its observed reads, evaluated in log-space.
#[derive(Debug, Clone, PartialEq)]
pub struct BernoulliPosterior {
    params: Array2<f64>,
}

impl BernoulliPosterior {
    /// Wraps a `segments × samples` parameter table, clipping every value
    /// into the open unit interval.
    pub fn new(params: Array2<f64>) -> Self {
        Self {
            params: params.mapv(clip_prob),
        }
    }

    pub fn from_prior(
        prior: &EmissionPrior,
        n_segments: usize,
        data: &Preprocessed,
    ) -> Self {
        let n_samples = data.n_samples();
        match prior {
            EmissionPrior::Uniform(p) => {
                Self::new(Array2::from_elem((n_segments, n_samples), *p))
            },
            EmissionPrior::Explicit(values) => {
                Self::new(Array2::from_shape_fn((n_segments, n_samples), |(k, _)| {
                    values.get(k).copied().unwrap_or(0.5)
                }))
            },
            EmissionPrior::ChunkMeans => Self::chunk_means(n_segments, data),
        }
    }

    fn chunk_means(
        n_segments: usize,
        data: &Preprocessed,
    ) -> Self {
        let n_positions = data.probs.n_positions();
        let mut sums = Array2::<f64>::zeros((n_segments, data.n_samples()));
        let mut counts = Array2::<f64>::zeros((n_segments, data.n_samples()));

        for pos in 0..n_positions {
            let chunk = pos * n_segments / n_positions;
            for &(read, p) in data.probs.observed(pos) {
                let sample = data.sample_ids[read];
                sums[[chunk, sample]] += p;
                counts[[chunk, sample]] += 1.0;
            }
        }

        let params = Array2::from_shape_fn(sums.dim(), |idx| {
            if counts[idx] > 0.0 {
                sums[idx] / counts[idx]
            }
            else {
                0.5
            }
        });
        Self::new(params)
    }

    pub fn n_segments(&self) -> usize {
        self.params.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.params.ncols()
    }

    /// The `segments × samples` parameter table.
    pub fn params(&self) -> &Array2<f64> {
        &self.params
    }

    pub fn param(
        &self,
        segment: usize,
        sample: SampleId,
    ) -> f64 {
        self.params[[segment, sample]]
    }

    /// Log-likelihood of one position's observed reads under `segment`.
    ///
    /// Returns 0 for a position without observations.
    pub fn likelihood(
        &self,
        observations: &[(usize, f64)],
        sample_ids: &[SampleId],
        segment: usize,
    ) -> f64 {
        let row = self.params.row(segment);
        observations
            .iter()
            .map(|&(read, o)| {
                let theta = row[sample_ids[read]];
                (o * theta + (1.0 - o) * (1.0 - theta)).ln()
            })
            .sum()
    }

    /// Log-likelihood table, `positions × segments`.
    pub fn log_emissions(
        &self,
        probs: &ProbabilityMatrix,
        sample_ids: &[SampleId],
    ) -> Array2<f64> {
        Array2::from_shape_fn((probs.n_positions(), self.n_segments()), |(pos, k)| {
            self.likelihood(probs.observed(pos), sample_ids, k)
        })
    }

    /// M-step: every parameter becomes the occupancy-weighted mean of the
    /// observed probabilities of its sample.
    ///
    /// Parameters without any weight keep their current value.
    pub fn reestimate(
        mut self,
        posterior: ArrayView2<f64>,
        probs: &ProbabilityMatrix,
        sample_ids: &[SampleId],
    ) -> Self {
        let mut num = Array2::<f64>::zeros(self.params.dim());
        let mut den = Array2::<f64>::zeros(self.params.dim());

        for pos in 0..probs.n_positions() {
            let observed = probs.observed(pos);
            if observed.is_empty() {
                continue;
            }
            for k in 0..self.n_segments() {
                let gamma = posterior[[pos, k]];
                if gamma == 0.0 {
                    continue;
                }
                for &(read, o) in observed {
                    num[[k, sample_ids[read]]] += gamma * o;
                    den[[k, sample_ids[read]]] += gamma;
                }
            }
        }

        let mut updated = 0usize;
        for ((param, n), d) in self
            .params
            .iter_mut()
            .zip(num.iter())
            .zip(den.iter())
        {
            if *d > 0.0 {
                *param = clip_prob(n / d);
                updated += 1;
            }
        }
        trace!(
            "Re-estimated {}/{} emission parameters",
            updated,
            self.params.len()
        );
        self
    }
}
