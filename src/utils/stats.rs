use statrs::function::logistic::logistic;

/// Lower clip bound for probabilities that later enter a logarithm.
pub const PROB_CLIP: f64 = 1e-12;

/// Clips a probability into `[PROB_CLIP, 1 - PROB_CLIP]`.
#[inline]
pub fn clip_prob(p: f64) -> f64 {
    p.clamp(PROB_CLIP, 1.0 - PROB_CLIP)
}

/// Converts a methylation log-likelihood ratio into a clipped probability.
///
/// Large-magnitude LLRs (including infinities) saturate to the clip bounds.
#[inline]
pub fn llr_to_prob(llr: f64) -> f64 {
    clip_prob(logistic(llr))
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax<I: IntoIterator<Item = f64>>(xs: I) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, val) in xs.into_iter().enumerate() {
        match best {
            Some((_, best_val)) if val <= best_val => {},
            _ => best = Some((idx, val)),
        }
    }
    best.map(|(idx, _)| idx)
}
