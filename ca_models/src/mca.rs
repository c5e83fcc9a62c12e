//! Maximal Causes Analysis: active causes compete instead of adding —
//! each observed dimension is explained by the strongest active cause,
//! `ȳ_d = max_{h ∈ s} W_dh`, with Gaussian noise around the max. The
//! generative fields are non-negative.

use em_core::{CandidateState, CausesModel, EmError, ModelParams, SuffStats};
use ndarray::{Array2, ArrayView1};
use rand::RngCore;

use crate::{linear, preselect};

pub struct Mca {
    d: usize,
    h: usize,
    gamma: usize,
}

impl Mca {
    pub fn new(d: usize, h: usize, gamma: usize) -> Self {
        Self { d, h, gamma }
    }
}

/// The winning cause and combined value for one dimension, ties broken
/// on the lowest cause index. `None` for the empty state.
fn max_winner(
    state: &CandidateState,
    params: &ModelParams,
    dim: usize,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for a in state.activations() {
        let w = params.weights[[dim, a.cause]];
        match best {
            Some((_, value)) if value >= w => {}
            _ => best = Some((a.cause, w)),
        }
    }
    best
}

pub(crate) fn competitive_log_gaussian(
    y: ArrayView1<'_, f64>,
    state: &CandidateState,
    params: &ModelParams,
    winner: fn(&CandidateState, &ModelParams, usize) -> Option<(usize, f64)>,
) -> f64 {
    let d = y.len();
    let sigma_sq = params.sigma * params.sigma;

    let mut rss = 0.0;
    for dim in 0..d {
        let mean = winner(state, params, dim).map(|(_, v)| v).unwrap_or(0.0);
        let r = y[dim] - mean;
        rss += r * r;
    }

    -0.5 * d as f64 * (2.0 * std::f64::consts::PI * sigma_sq).ln() - rss / (2.0 * sigma_sq)
}

/// Winner-takes-dimension statistics: the responsibility mass of a
/// state flows to the cause that explains each dimension.
pub(crate) fn competitive_accumulate(
    y: ArrayView1<'_, f64>,
    space: &[CandidateState],
    responsibilities: &[f64],
    params: &ModelParams,
    stats: &mut SuffStats,
    winner: fn(&CandidateState, &ModelParams, usize) -> Option<(usize, f64)>,
) {
    for (state, &q) in space.iter().zip(responsibilities) {
        if q == 0.0 {
            continue;
        }

        stats.add_pi(q * state.arity() as f64);

        let mut rss = 0.0;
        for dim in 0..y.len() {
            match winner(state, params, dim) {
                Some((cause, value)) => {
                    stats.wp_mut()[[cause, dim]] += q * y[dim];
                    stats.wq_mut()[[cause, dim]] += q;
                    let r = y[dim] - value;
                    rss += r * r;
                }
                None => rss += y[dim] * y[dim],
            }
        }
        stats.add_sigma(q * rss);
    }
}

/// Shared max-rule update: each field entry moves to the responsibility-
/// weighted mean of the data it won; entries with no evidence keep
/// their previous value.
pub(crate) fn competitive_m_step(
    stats: &SuffStats,
    n_total: usize,
    params: &ModelParams,
    gamma: usize,
    nonneg: bool,
) -> Result<ModelParams, EmError> {
    const EVIDENCE_EPS: f64 = 1e-12;

    let (d, h) = params.dims();
    let n = n_total as f64;

    if !stats.is_finite() {
        return Err(EmError::Numerical {
            context: "reduced sufficient statistics",
        });
    }

    let mut weights = Array2::zeros((d, h));
    for cause in 0..h {
        for dim in 0..d {
            let denom = stats.wq()[[cause, dim]];
            let mut w = if denom > EVIDENCE_EPS {
                stats.wp()[[cause, dim]] / denom
            } else {
                params.weights[[dim, cause]]
            };
            if nonneg {
                w = w.max(0.0);
            }
            weights[[dim, cause]] = w;
        }
    }
    if weights.iter().any(|v| !v.is_finite()) {
        return Err(EmError::Numerical {
            context: "field update",
        });
    }

    let pi = linear::pi_correction(h, gamma, params.pi) * stats.pi_sum() / (h as f64 * n);
    if !pi.is_finite() || pi <= 0.0 || pi >= 1.0 {
        return Err(EmError::Numerical {
            context: "activation prior update",
        });
    }

    let sigma = (stats.sigma_sum() / (d as f64 * n)).sqrt();
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(EmError::Numerical {
            context: "noise scale update",
        });
    }

    Ok(ModelParams::new(weights, pi, sigma))
}

impl CausesModel for Mca {
    fn dims(&self) -> (usize, usize) {
        (self.d, self.h)
    }

    fn gamma(&self) -> usize {
        self.gamma
    }

    fn log_joint(
        &self,
        y: ArrayView1<'_, f64>,
        state: &CandidateState,
        params: &ModelParams,
    ) -> f64 {
        let k = state.arity() as f64;
        let prior = k * params.pi.ln() + (self.h as f64 - k) * (1.0 - params.pi).ln();
        prior + competitive_log_gaussian(y, state, params, max_winner)
    }

    fn preselection_score(
        &self,
        y: ArrayView1<'_, f64>,
        params: &ModelParams,
        scores: &mut Vec<f64>,
    ) {
        preselect::cosine_scores(y, params, false, scores);
    }

    fn empty_stats(&self) -> SuffStats {
        SuffStats::zeros((self.h, self.d), (self.h, self.d))
    }

    fn accumulate_statistics(
        &self,
        y: ArrayView1<'_, f64>,
        space: &[CandidateState],
        responsibilities: &[f64],
        params: &ModelParams,
        stats: &mut SuffStats,
    ) {
        competitive_accumulate(y, space, responsibilities, params, stats, max_winner);
    }

    fn m_step(
        &self,
        stats: &SuffStats,
        n_total: usize,
        params: &ModelParams,
    ) -> Result<ModelParams, EmError> {
        competitive_m_step(stats, n_total, params, self.gamma, true)
    }

    fn init_params(&self, mean: &[f64], std: f64, rng: &mut dyn RngCore) -> ModelParams {
        linear::seed_params(self.d, self.h, mean, std, rng, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use em_core::Activation;
    use ndarray::array;

    fn pair(a: usize, b: usize) -> CandidateState {
        CandidateState::new(vec![
            Activation { cause: a, value: 1.0 },
            Activation { cause: b, value: 1.0 },
        ])
    }

    #[test]
    fn causes_compete_instead_of_adding() {
        // Two overlapping fields; the combined mean is the max, not the sum.
        let params = ModelParams::new(array![[2.0, 1.0], [0.0, 1.0]], 0.3, 0.5);
        let model = Mca::new(2, 2, 2);

        // max(W·,0, W·,1) = [2, 1]; the additive mean would be [3, 1].
        let y = array![2.0, 1.0];
        let both = model.log_joint(y.view(), &pair(0, 1), &params);

        let y_sum = array![3.0, 1.0];
        let both_at_sum = model.log_joint(y_sum.view(), &pair(0, 1), &params);
        assert!(both > both_at_sum);
    }

    #[test]
    fn winner_statistics_go_to_the_strongest_cause() {
        let params = ModelParams::new(array![[2.0, 1.0], [0.0, 1.0]], 0.3, 0.5);
        let model = Mca::new(2, 2, 2);
        let y = array![2.0, 1.0];
        let space = vec![CandidateState::empty(), pair(0, 1)];
        let resp = [0.0, 1.0];

        let mut stats = model.empty_stats();
        model.accumulate_statistics(y.view(), &space, &resp, &params, &mut stats);

        // Dim 0 won by cause 0, dim 1 by cause 1.
        assert_eq!(stats.wq()[[0, 0]], 1.0);
        assert_eq!(stats.wq()[[0, 1]], 0.0);
        assert_eq!(stats.wq()[[1, 1]], 1.0);
        assert_eq!(stats.wp()[[0, 0]], 2.0);
        assert_eq!(stats.wp()[[1, 1]], 1.0);
    }

    #[test]
    fn m_step_keeps_fields_without_evidence_and_stays_nonneg() {
        let params = ModelParams::new(array![[2.0, 1.0], [0.0, 1.0]], 0.3, 0.5);
        let model = Mca::new(2, 2, 2);

        let mut stats = model.empty_stats();
        stats.wp_mut()[[0, 0]] = -1.0; // would go negative
        stats.wq_mut()[[0, 0]] = 1.0;
        stats.add_pi(0.5);
        stats.add_sigma(0.5);
        stats.add_point();

        let next = model.m_step(&stats, 1, &params).unwrap();
        assert_eq!(next.weights[[0, 0]], 0.0); // clamped
        assert_eq!(next.weights[[1, 1]], 1.0); // no evidence, kept
    }
}
