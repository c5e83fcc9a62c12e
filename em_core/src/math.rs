//! Log-space numerics shared by every model variant.

/// Stable log(Σ exp(x_i)) over a non-empty slice.
///
/// Subtracts the maximum before exponentiating so that widely spread
/// log-weights neither overflow nor all underflow to zero. Returns
/// negative infinity for an empty slice.
pub fn log_sum_exp(log_weights: &[f64]) -> f64 {
    let max = log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    if !max.is_finite() {
        // All -inf (or empty): the sum is zero. A NaN or +inf input
        // propagates so callers can detect it.
        return max;
    }

    let sum: f64 = log_weights.iter().map(|lw| (lw - max).exp()).sum();
    max + sum.ln()
}

/// Normalizes log-weights in place into posterior responsibilities.
///
/// Returns the log-sum-exp of the inputs (the per-point free-energy
/// contribution). After the call the slice holds non-negative weights
/// summing to 1 over the truncated state space.
pub fn normalize_responsibilities(log_weights: &mut [f64]) -> f64 {
    let lse = log_sum_exp(log_weights);

    for lw in log_weights.iter_mut() {
        *lw = (*lw - lse).exp();
    }

    lse
}

/// Binomial coefficient C(n, k) as a float, by iterative product.
///
/// Exact for the small n used by the truncated-prior correction.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }

    let k = k.min(n - k);
    let mut c = 1.0;
    for i in 0..k {
        c = c * (n - i) as f64 / (i + 1) as f64;
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sum_exp_matches_naive_for_small_inputs() {
        let xs: [f64; 3] = [-1.0, 0.5, 0.0];
        let naive: f64 = xs.iter().map(|x| x.exp()).sum::<f64>().ln();
        assert!((log_sum_exp(&xs) - naive).abs() < 1e-12);
    }

    #[test]
    fn log_sum_exp_survives_widely_spread_inputs() {
        let xs = [-1000.0, -1001.0];
        let got = log_sum_exp(&xs);
        assert!(got.is_finite());
        assert!((got - (-1000.0 + (1.0 + (-1.0f64).exp()).ln())).abs() < 1e-9);

        let large = [700.0, 710.0];
        assert!(log_sum_exp(&large).is_finite());
    }

    #[test]
    fn responsibilities_sum_to_one() {
        let mut lw = [-800.0, -802.0, -790.0];
        let lse = normalize_responsibilities(&mut lw);
        assert!(lse.is_finite());
        let total: f64 = lw.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(lw.iter().all(|&r| r >= 0.0));
        // The third entry dominates.
        assert!(lw[2] > lw[0] && lw[2] > lw[1]);
    }

    #[test]
    fn binomial_small_values() {
        assert_eq!(binomial(5, 0), 1.0);
        assert_eq!(binomial(5, 2), 10.0);
        assert_eq!(binomial(5, 5), 1.0);
        assert_eq!(binomial(3, 4), 0.0);
    }
}
