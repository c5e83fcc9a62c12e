//! Gaussian Sparse Coding: spike-and-slab latents. A candidate state
//! fixes the binary support; the unit-variance Gaussian amplitudes of
//! the active causes are integrated out analytically, which keeps the
//! state space discrete while the activations stay continuous.
//!
//! All dense work happens on the |s|×|s| system (|s| ≤ gamma), via the
//! Woodbury identity: `C = σ²I_D + W_s W_sᵀ` never materializes.

use em_core::{CandidateState, CausesModel, EmError, ModelParams, SuffStats, linalg};
use ndarray::ArrayView1;
use rand::RngCore;

use crate::{linear, preselect};

pub struct Gsc {
    d: usize,
    h: usize,
    gamma: usize,
}

impl Gsc {
    pub fn new(d: usize, h: usize, gamma: usize) -> Self {
        Self { d, h, gamma }
    }
}

/// The k×k inner system `B = σ²I + W_sᵀW_s` and the projection
/// `wy = W_sᵀ y` for one candidate state.
struct InnerSystem {
    causes: Vec<usize>,
    gram: Vec<f64>,
    b_chol: Vec<f64>,
    wy: Vec<f64>,
}

fn inner_system(
    y: ArrayView1<'_, f64>,
    state: &CandidateState,
    params: &ModelParams,
) -> Option<InnerSystem> {
    let k = state.arity();
    let d = y.len();
    let sigma_sq = params.sigma * params.sigma;

    let causes: Vec<usize> = state.activations().iter().map(|a| a.cause).collect();

    let mut gram = vec![0.0; k * k];
    let mut wy = vec![0.0; k];
    for (i, &hi) in causes.iter().enumerate() {
        for (j, &hj) in causes.iter().enumerate().skip(i) {
            let mut dot = 0.0;
            for row in 0..d {
                dot += params.weights[[row, hi]] * params.weights[[row, hj]];
            }
            gram[i * k + j] = dot;
            gram[j * k + i] = dot;
        }
        for row in 0..d {
            wy[i] += params.weights[[row, hi]] * y[row];
        }
    }

    let mut b = gram.clone();
    for i in 0..k {
        b[i * k + i] += sigma_sq;
    }

    let b_chol = linalg::cholesky(&b, k).ok()?;
    Some(InnerSystem {
        causes,
        gram,
        b_chol,
        wy,
    })
}

impl CausesModel for Gsc {
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
        let d = self.d as f64;
        let k = state.arity();
        let sigma_sq = params.sigma * params.sigma;
        let y_sq: f64 = y.iter().map(|v| v * v).sum();

        let prior = k as f64 * params.pi.ln() + (self.h - k) as f64 * (1.0 - params.pi).ln();
        let norm = -0.5 * d * (2.0 * std::f64::consts::PI).ln();

        if k == 0 {
            return prior + norm - 0.5 * d * sigma_sq.ln() - y_sq / (2.0 * sigma_sq);
        }

        let Some(sys) = inner_system(y, state, params) else {
            // Degenerate σ/W; surfaces as a numerical failure upstream.
            return f64::NAN;
        };

        // log det C = (D−k)·ln σ² + ln det B.
        let logdet =
            (d - k as f64) * sigma_sq.ln() + linalg::cholesky_logdet(&sys.b_chol, k);

        // y'C⁻¹y = (‖y‖² − wy'B⁻¹wy)/σ².
        let mut solved = sys.wy.clone();
        linalg::cholesky_solve(&sys.b_chol, k, &mut solved);
        let explained: f64 = sys.wy.iter().zip(&solved).map(|(a, b)| a * b).sum();
        let quad = (y_sq - explained) / sigma_sq;

        prior + norm - 0.5 * logdet - 0.5 * quad
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
        SuffStats::zeros((self.h, self.d), (self.h, self.h))
    }

    fn accumulate_statistics(
        &self,
        y: ArrayView1<'_, f64>,
        space: &[CandidateState],
        responsibilities: &[f64],
        params: &ModelParams,
        stats: &mut SuffStats,
    ) {
        let d = self.d;
        let sigma_sq = params.sigma * params.sigma;
        let y_sq: f64 = y.iter().map(|v| v * v).sum();

        for (state, &q) in space.iter().zip(responsibilities) {
            if q == 0.0 {
                continue;
            }

            let k = state.arity();
            if k == 0 {
                stats.add_sigma(q * y_sq);
                continue;
            }

            let Some(sys) = inner_system(y, state, params) else {
                stats.add_sigma(f64::NAN);
                continue;
            };

            // Amplitude posterior: μ = B⁻¹wy, Σ = σ²B⁻¹.
            let mut mu = sys.wy.clone();
            linalg::cholesky_solve(&sys.b_chol, k, &mut mu);
            let mut cov = linalg::cholesky_inverse(&sys.b_chol, k);
            for v in cov.iter_mut() {
                *v *= sigma_sq;
            }

            stats.add_pi(q * k as f64);

            // E‖y − W_s z‖² = ‖y − W_s μ‖² + tr(G Σ).
            let mut rss = 0.0;
            for row in 0..d {
                let mut mean = 0.0;
                for (i, &cause) in sys.causes.iter().enumerate() {
                    mean += mu[i] * params.weights[[row, cause]];
                }
                let r = y[row] - mean;
                rss += r * r;
            }
            let mut tr = 0.0;
            for i in 0..k {
                for j in 0..k {
                    tr += sys.gram[i * k + j] * cov[j * k + i];
                }
            }
            stats.add_sigma(q * (rss + tr));

            // First/second posterior moments for the normal equations.
            for (i, &ci) in sys.causes.iter().enumerate() {
                for row in 0..d {
                    stats.wp_mut()[[ci, row]] += q * mu[i] * y[row];
                }
                for (j, &cj) in sys.causes.iter().enumerate() {
                    stats.wq_mut()[[ci, cj]] += q * (mu[i] * mu[j] + cov[i * k + j]);
                }
            }
        }
    }

    fn m_step(
        &self,
        stats: &SuffStats,
        n_total: usize,
        params: &ModelParams,
    ) -> Result<ModelParams, EmError> {
        linear::m_step(stats, n_total, params, self.gamma)
    }

    fn init_params(&self, mean: &[f64], std: f64, rng: &mut dyn RngCore) -> ModelParams {
        linear::seed_params(self.d, self.h, mean, std, rng, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use em_core::Activation;
    use ndarray::array;

    fn model_and_params() -> (Gsc, ModelParams) {
        let params = ModelParams::new(array![[1.0, 0.0], [0.0, 1.0]], 0.25, 0.5);
        (Gsc::new(2, 2, 2), params)
    }

    fn single(cause: usize) -> CandidateState {
        CandidateState::new(vec![Activation { cause, value: 1.0 }])
    }

    #[test]
    fn empty_state_marginal_matches_the_isotropic_gaussian() {
        let (model, params) = model_and_params();
        let y = array![0.3, -0.2];

        let got = model.log_joint(y.view(), &CandidateState::empty(), &params);

        let sigma_sq = 0.25;
        let y_sq: f64 = 0.3f64 * 0.3 + 0.2 * 0.2;
        let expected = 2.0 * (0.75f64).ln()
            - (2.0 * std::f64::consts::PI * sigma_sq).ln()
            - y_sq / (2.0 * sigma_sq);
        assert!((got - expected).abs() < 1e-10);
    }

    #[test]
    fn single_cause_marginal_matches_the_dense_covariance() {
        let (model, params) = model_and_params();
        let y = array![1.0, 0.5];

        let got = model.log_joint(y.view(), &single(0), &params);

        // C = diag(σ² + 1, σ²) for the unit column e₀.
        let sigma_sq: f64 = 0.25;
        let prior = (0.25f64).ln() + (0.75f64).ln();
        let expected = prior
            - (2.0 * std::f64::consts::PI).ln()
            - 0.5 * ((sigma_sq + 1.0).ln() + sigma_sq.ln())
            - 0.5 * (1.0 / (sigma_sq + 1.0) + 0.25 / sigma_sq);
        assert!((got - expected).abs() < 1e-10);
    }

    #[test]
    fn aligned_data_prefers_the_aligned_support() {
        let (model, params) = model_and_params();
        let y = array![2.0, 0.0];

        let on_axis = model.log_joint(y.view(), &single(0), &params);
        let off_axis = model.log_joint(y.view(), &single(1), &params);
        assert!(on_axis > off_axis);
    }

    #[test]
    fn responsibilities_fill_posterior_moments() {
        let (model, params) = model_and_params();
        let y = array![1.0, 0.0];
        let space = vec![CandidateState::empty(), single(0)];
        let resp = [0.0, 1.0];

        let mut stats = model.empty_stats();
        model.accumulate_statistics(y.view(), &space, &resp, &params, &mut stats);

        // μ = wy/B = 1/(σ²+1) = 0.8, Σ = σ²/(σ²+1) = 0.2.
        assert!((stats.wp()[[0, 0]] - 0.8).abs() < 1e-12);
        assert!((stats.wq()[[0, 0]] - (0.8 * 0.8 + 0.2)).abs() < 1e-12);
        assert!((stats.pi_sum() - 1.0).abs() < 1e-12);
    }
}
