//! Machinery shared by the linear-superposition family (BSC, GSC, TSC,
//! DSC): Gaussian likelihood around `W s`, posterior-weighted normal
//! equations and the truncated-prior activation correction.

use em_core::{CandidateState, EmError, ModelParams, SuffStats, linalg, math};
use ndarray::{Array2, ArrayView1};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

/// ln N(y; W s, σ²I) for a sparse state under linear superposition.
pub(crate) fn log_gaussian(
    y: ArrayView1<'_, f64>,
    state: &CandidateState,
    params: &ModelParams,
) -> f64 {
    let d = y.len();
    let sigma_sq = params.sigma * params.sigma;

    let rss = residual_sq(y, state, params);
    -0.5 * d as f64 * (2.0 * std::f64::consts::PI * sigma_sq).ln() - rss / (2.0 * sigma_sq)
}

/// Σ_d (y_d − Σ_{(h,v) ∈ s} v·W_dh)².
pub(crate) fn residual_sq(
    y: ArrayView1<'_, f64>,
    state: &CandidateState,
    params: &ModelParams,
) -> f64 {
    let mut rss = 0.0;
    for d in 0..y.len() {
        let mut mean = 0.0;
        for a in state.activations() {
            mean += a.value * params.weights[[d, a.cause]];
        }
        let r = y[d] - mean;
        rss += r * r;
    }
    rss
}

/// Adds one point's posterior-weighted statistics for the linear family:
/// `wp += q·s·yᵀ`, `wq += q·s·sᵀ`, activation count and residual power.
pub(crate) fn accumulate(
    y: ArrayView1<'_, f64>,
    space: &[CandidateState],
    responsibilities: &[f64],
    params: &ModelParams,
    stats: &mut SuffStats,
) {
    for (state, &q) in space.iter().zip(responsibilities) {
        if q == 0.0 {
            continue;
        }

        stats.add_pi(q * state.arity() as f64);
        stats.add_sigma(q * residual_sq(y, state, params));

        for a in state.activations() {
            for d in 0..y.len() {
                stats.wp_mut()[[a.cause, d]] += q * a.value * y[d];
            }
            for b in state.activations() {
                stats.wq_mut()[[a.cause, b.cause]] += q * a.value * b.value;
            }
        }
    }
}

/// Closed-form update for the linear family from reduced statistics:
/// dictionary by solving `wq · Wᵀ = wp`, then the corrected activation
/// prior and the residual noise scale.
pub(crate) fn m_step(
    stats: &SuffStats,
    n_total: usize,
    params: &ModelParams,
    gamma: usize,
) -> Result<ModelParams, EmError> {
    let (d, h) = params.dims();
    let n = n_total as f64;

    if !stats.is_finite() {
        return Err(EmError::Numerical {
            context: "reduced sufficient statistics",
        });
    }

    // Normal equations; a tiny ridge recovers rank-deficient wq, e.g.
    // when a cause never entered any candidate set this iteration.
    let trace: f64 = (0..h).map(|i| stats.wq()[[i, i]]).sum();
    let ridge = 1e-9 * (trace / h as f64).max(1.0);
    let solved = linalg::solve_ridged(stats.wq(), stats.wp(), ridge)
        .map_err(|_| EmError::Numerical {
            context: "dictionary update (singular normal equations)",
        })?;

    let mut weights = Array2::zeros((d, h));
    for cause in 0..h {
        for row in 0..d {
            weights[[row, cause]] = solved[[cause, row]];
        }
    }
    if weights.iter().any(|v| !v.is_finite()) {
        return Err(EmError::Numerical {
            context: "dictionary update",
        });
    }

    let pi = pi_correction(h, gamma, params.pi) * stats.pi_sum() / (h as f64 * n);
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

/// Correction factor for the activation prior under state truncation.
///
/// With at most `gamma` active causes admitted per state, the raw
/// posterior activation count underestimates π. The factor
/// `π·H·A/B` with `A = Σ_{g≤γ} C(H,g) π^g (1−π)^{H−g}` and
/// `B = Σ_{g≤γ} g·C(H,g) π^g (1−π)^{H−g}` reweights it; it degenerates
/// to 1 when `gamma = H`.
pub(crate) fn pi_correction(h: usize, gamma: usize, pi: f64) -> f64 {
    let mut a = 0.0;
    let mut b = 0.0;

    for g in 0..=gamma.min(h) {
        let mass = math::binomial(h, g) * pi.powi(g as i32) * (1.0 - pi).powi((h - g) as i32);
        a += mass;
        b += g as f64 * mass;
    }

    let corr = pi * h as f64 * a / b;
    if corr.is_finite() && corr > 0.0 { corr } else { 1.0 }
}

/// Data-driven initialization shared by every variant: dictionary
/// columns are the global data mean plus seeded Gaussian noise scaled
/// by the global standard deviation.
pub(crate) fn seed_params(
    d: usize,
    h: usize,
    mean: &[f64],
    std: f64,
    rng: &mut dyn RngCore,
    nonneg: bool,
) -> ModelParams {
    let std = if std > 0.0 && std.is_finite() { std } else { 1.0 };
    let mut weights = Array2::zeros((d, h));

    for cause in 0..h {
        for row in 0..d {
            let z: f64 = rng.sample(StandardNormal);
            let w = mean.get(row).copied().unwrap_or(0.0) + std * z;
            weights[[row, cause]] = if nonneg { w.abs() } else { w };
        }
    }

    let pi = (1.0 / h as f64).min(0.5);
    ModelParams::new(weights, pi, std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use em_core::Activation;
    use ndarray::array;

    fn params_2x2() -> ModelParams {
        ModelParams::new(array![[1.0, 0.0], [0.0, 1.0]], 0.25, 0.5)
    }

    #[test]
    fn residual_of_exact_superposition_is_zero() {
        let params = params_2x2();
        let state = CandidateState::new(vec![
            Activation { cause: 0, value: 1.0 },
            Activation { cause: 1, value: 1.0 },
        ]);
        let y = array![1.0, 1.0];
        assert!(residual_sq(y.view(), &state, &params) < 1e-12);
    }

    #[test]
    fn pi_correction_is_identity_for_full_gamma() {
        let corr = pi_correction(4, 4, 0.2);
        assert!((corr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pi_correction_inflates_truncated_counts() {
        // With gamma < H some activation mass is unreachable, so the
        // correction must be > 1.
        assert!(pi_correction(8, 2, 0.3) > 1.0);
    }

    #[test]
    fn accumulate_fills_normal_equation_terms() {
        let params = params_2x2();
        let space = vec![
            CandidateState::empty(),
            CandidateState::new(vec![Activation { cause: 0, value: 1.0 }]),
        ];
        let resp = [0.25, 0.75];
        let y = array![2.0, 0.0];

        let mut stats = SuffStats::zeros((2, 2), (2, 2));
        accumulate(y.view(), &space, &resp, &params, &mut stats);

        assert!((stats.wp()[[0, 0]] - 1.5).abs() < 1e-12);
        assert!((stats.wq()[[0, 0]] - 0.75).abs() < 1e-12);
        assert!((stats.pi_sum() - 0.75).abs() < 1e-12);
    }
}
