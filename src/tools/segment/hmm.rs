//! Segmentation HMM: scaled forward-backward, Baum-Welch training and
//! per-position MAP decoding.
//!
//! States are ordered segment types. From state `s` the chain stays with
//! weight `t_stay` and moves to the neighbouring states with weight
//! `t_move`, split by `forward_fraction` between `s + 1` and `s - 1`. Moves
//! that would leave the state range fall back onto `t_stay`. A floor `eps` is
//! added to every transition and emission term before rows are normalized.

use log::{
    debug,
    warn,
};
use ndarray::{
    Array1,
    Array2,
    ArrayView2,
    Axis,
};

use super::config::SegmentationConfig;
use super::emission::BernoulliPosterior;
use super::preprocess::Preprocessed;
use crate::data_structs::typedef::LabelType;
use crate::error::{
    Result,
    SegmentationError,
};
use crate::utils::argmax;

/// Trainable state of the HMM for one task unit.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmState {
    pub emission:    BernoulliPosterior,
    /// Row-stochastic `segments × segments` matrix.
    pub transitions: Array2<f64>,
}

/// E-step output.
#[derive(Debug, Clone)]
pub struct ForwardBackward {
    /// `positions × segments` occupancy probabilities.
    pub posterior:         Array2<f64>,
    /// Expected number of `i -> j` transitions summed over the chain.
    pub transition_counts: Array2<f64>,
    pub log_likelihood:    f64,
}

/// Result of [`SegmentationHmm::baum_welch`].
#[derive(Debug, Clone)]
pub struct TrainedHmm {
    pub state:          HmmState,
    pub posterior:      Array2<f64>,
    pub log_likelihood: f64,
    pub iterations:     usize,
    pub converged:      bool,
}

#[derive(Debug, Clone)]
pub struct SegmentationHmm {
    config: SegmentationConfig,
}

impl SegmentationHmm {
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn n_segments(&self) -> usize {
        self.config.max_segments
    }

    /// Transition matrix before any training.
    pub fn initial_transitions(&self) -> Result<Array2<f64>> {
        let n = self.n_segments();
        let fwd = self.config.t_move * self.config.forward_fraction;
        let bwd = self.config.t_move * (1.0 - self.config.forward_fraction);

        let mut transitions = Array2::<f64>::zeros((n, n));
        for s in 0..n {
            transitions[[s, s]] += self.config.t_stay;
            if s + 1 < n {
                transitions[[s, s + 1]] += fwd;
            }
            else {
                transitions[[s, s]] += fwd;
            }
            if s > 0 {
                transitions[[s, s - 1]] += bwd;
            }
            else {
                transitions[[s, s]] += bwd;
            }
        }
        normalize_rows(&mut transitions, self.config.eps)?;
        Ok(transitions)
    }

    /// The chain starts in state 0.
    pub fn initial_distribution(&self) -> Array1<f64> {
        let mut initial = Array1::from_elem(self.n_segments(), self.config.eps);
        initial[0] += 1.0;
        let total = initial.sum();
        initial / total
    }

    pub fn init_state(
        &self,
        data: &Preprocessed,
    ) -> Result<HmmState> {
        Ok(HmmState {
            emission:    BernoulliPosterior::from_prior(
                &self.config.prior,
                self.n_segments(),
                data,
            ),
            transitions: self.initial_transitions()?,
        })
    }

    /// Scaled forward-backward pass.
    pub fn forward_backward(
        &self,
        state: &HmmState,
        data: &Preprocessed,
    ) -> Result<ForwardBackward> {
        let n_pos = data.probs.n_positions();
        let n_seg = self.n_segments();
        let trans = &state.transitions;

        // Emission terms are shifted by their row maximum before exponentiation
        let mut emissions = state
            .emission
            .log_emissions(&data.probs, &data.sample_ids);
        let mut log_likelihood = 0.0;
        for mut row in emissions.axis_iter_mut(Axis(0)) {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|ll| (ll - max).exp() + self.config.eps);
            log_likelihood += max;
        }

        let mut alpha = Array2::<f64>::zeros((n_pos, n_seg));
        let mut scale = Array1::<f64>::zeros(n_pos);

        let initial = self.initial_distribution();
        for k in 0..n_seg {
            alpha[[0, k]] = initial[k] * emissions[[0, k]];
        }
        scale[0] = rescale(alpha.row_mut(0), 0, "forward")?;

        for t in 1..n_pos {
            for j in 0..n_seg {
                let mut acc = 0.0;
                for i in 0..n_seg {
                    acc += alpha[[t - 1, i]] * trans[[i, j]];
                }
                alpha[[t, j]] = acc * emissions[[t, j]];
            }
            scale[t] = rescale(alpha.row_mut(t), t, "forward")?;
        }
        log_likelihood += scale.iter().map(|c| c.ln()).sum::<f64>();

        let mut beta = Array2::<f64>::zeros((n_pos, n_seg));
        beta.row_mut(n_pos - 1).fill(1.0);
        for t in (0..n_pos - 1).rev() {
            for i in 0..n_seg {
                let mut acc = 0.0;
                for j in 0..n_seg {
                    acc += trans[[i, j]] * emissions[[t + 1, j]] * beta[[t + 1, j]];
                }
                beta[[t, i]] = acc / scale[t + 1];
            }
            let total = beta.row(t).sum();
            if !(total > 0.0 && total.is_finite()) {
                return Err(SegmentationError::instability(
                    t,
                    format!("backward scaling factor is {}", total),
                ));
            }
        }

        let mut posterior = &alpha * &beta;
        for (t, row) in posterior.axis_iter_mut(Axis(0)).enumerate() {
            rescale(row, t, "posterior")?;
        }

        let mut transition_counts = Array2::<f64>::zeros((n_seg, n_seg));
        for t in 0..n_pos - 1 {
            for i in 0..n_seg {
                let a = alpha[[t, i]];
                if a == 0.0 {
                    continue;
                }
                for j in 0..n_seg {
                    transition_counts[[i, j]] += a
                        * trans[[i, j]]
                        * emissions[[t + 1, j]]
                        * beta[[t + 1, j]]
                        / scale[t + 1];
                }
            }
        }

        Ok(ForwardBackward {
            posterior,
            transition_counts,
            log_likelihood,
        })
    }

    /// M-step: re-estimates emission parameters and transitions.
    pub fn m_step(
        &self,
        state: HmmState,
        fb: &ForwardBackward,
        data: &Preprocessed,
    ) -> Result<HmmState> {
        let emission = state.emission.reestimate(
            fb.posterior.view(),
            &data.probs,
            &data.sample_ids,
        );

        let mut transitions = state.transitions;
        for (mut row, counts) in transitions
            .axis_iter_mut(Axis(0))
            .zip(fb.transition_counts.axis_iter(Axis(0)))
        {
            let departures = counts.sum();
            // States never left keep their previous row
            if departures > 0.0 {
                row.assign(&(&counts / departures));
            }
        }
        normalize_rows(&mut transitions, self.config.eps)?;

        Ok(HmmState {
            emission,
            transitions,
        })
    }

    /// Trains the model until the log-likelihood improvement drops below
    /// `tol`. When `max_iterations` is reached first, the best iterate is
    /// returned with `converged == false`.
    pub fn baum_welch(
        &self,
        data: &Preprocessed,
    ) -> Result<TrainedHmm> {
        let mut state = self.init_state(data)?;
        let mut best: Option<TrainedHmm> = None;
        let mut prev_ll = f64::NEG_INFINITY;

        for iteration in 1..=self.config.max_iterations {
            let fb = self.forward_backward(&state, data)?;
            let ll = fb.log_likelihood;
            let converged = ll - prev_ll < self.config.tol;
            let improved = best
                .as_ref()
                .map_or(true, |b| ll > b.log_likelihood);
            debug!(
                "Baum-Welch iteration {}: log-likelihood {:.6} (delta {:.3e})",
                iteration,
                ll,
                ll - prev_ll
            );
            prev_ll = ll;

            if converged {
                let trained = match best {
                    Some(best) if !improved => best,
                    _ => TrainedHmm::new(state, fb),
                };
                return Ok(trained.finish(iteration, true));
            }

            state = if improved {
                let next = self.m_step(state.clone(), &fb, data)?;
                best = Some(TrainedHmm::new(state, fb));
                next
            }
            else {
                self.m_step(state, &fb, data)?
            };
        }

        warn!(
            "Baum-Welch did not converge within {} iterations, using best iterate",
            self.config.max_iterations
        );
        best.map(|b| b.finish(self.config.max_iterations, false))
            .ok_or_else(|| {
                SegmentationError::config("max_iterations must be at least 1")
            })
    }

    /// Per-position argmax of the posterior, ties to the lowest state.
    pub fn map(posterior: ArrayView2<f64>) -> Vec<LabelType> {
        posterior
            .axis_iter(Axis(0))
            .map(|row| argmax(row.iter().copied()).unwrap_or(0))
            .collect()
    }
}

impl TrainedHmm {
    fn new(
        state: HmmState,
        fb: ForwardBackward,
    ) -> Self {
        Self {
            state,
            posterior: fb.posterior,
            log_likelihood: fb.log_likelihood,
            iterations: 0,
            converged: false,
        }
    }

    fn finish(
        mut self,
        iterations: usize,
        converged: bool,
    ) -> Self {
        self.iterations = iterations;
        self.converged = converged;
        self
    }
}

/// Divides a row by its sum and returns the sum.
fn rescale(
    mut row: ndarray::ArrayViewMut1<f64>,
    position: usize,
    pass: &str,
) -> Result<f64> {
    let total = row.sum();
    if !(total > 0.0 && total.is_finite()) {
        return Err(SegmentationError::instability(
            position,
            format!("{} scaling factor is {}", pass, total),
        ));
    }
    row /= total;
    Ok(total)
}

/// Adds `eps` to every entry and normalizes each row to sum to one.
fn normalize_rows(
    matrix: &mut Array2<f64>,
    eps: f64,
) -> Result<()> {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        row += eps;
        let total = row.sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(SegmentationError::config(
                "transition row cannot be normalized",
            ));
        }
        row /= total;
    }
    Ok(())
}
