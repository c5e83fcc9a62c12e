//! Shared preselection machinery: cheap per-cause scoring and ranking.
//!
//! Preselection narrows the combinatorial state space down to subsets
//! of the `Hprime` most promising causes. It is an approximation, not a
//! bound: a cause outside the top `Hprime` is simply never considered
//! for that data point.

use em_core::ModelParams;
use ndarray::ArrayView1;

/// Cosine similarity between each dictionary column and the data point.
///
/// `absolute` takes |cos| — used by variants whose activations can flip
/// the correlation sign (ternary signs, discrete values, max-magnitude
/// combination). Degenerate norms score 0.
pub fn cosine_scores(
    y: ArrayView1<'_, f64>,
    params: &ModelParams,
    absolute: bool,
    scores: &mut Vec<f64>,
) {
    let (d, h) = params.dims();
    scores.clear();

    let y_norm = y.iter().map(|v| v * v).sum::<f64>().sqrt();

    for cause in 0..h {
        let mut dot = 0.0;
        let mut w_norm_sq = 0.0;
        for row in 0..d {
            let w = params.weights[[row, cause]];
            dot += w * y[row];
            w_norm_sq += w * w;
        }

        let denom = w_norm_sq.sqrt() * y_norm;
        let score = if denom > 0.0 { dot / denom } else { 0.0 };
        scores.push(if absolute { score.abs() } else { score });
    }
}

/// Ranks causes by score, best first.
///
/// Deterministic: equal scores tie-break on ascending cause index.
/// Degenerate inputs (all-zero or any non-finite score, e.g. freshly
/// initialized parameters) fall back to the canonical index order
/// instead of failing.
pub fn rank_causes(scores: &[f64]) -> Vec<usize> {
    let degenerate =
        scores.iter().any(|s| !s.is_finite()) || scores.iter().all(|&s| s == 0.0);
    if degenerate {
        return (0..scores.len()).collect();
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn ranks_descending_with_stable_ties() {
        let order = rank_causes(&[0.5, 0.9, 0.5, 0.1]);
        assert_eq!(order, vec![1, 0, 2, 3]);
    }

    #[test]
    fn all_zero_scores_fall_back_to_canonical_order() {
        assert_eq!(rank_causes(&[0.0, 0.0, 0.0]), vec![0, 1, 2]);
    }

    #[test]
    fn non_finite_scores_fall_back_to_canonical_order() {
        assert_eq!(rank_causes(&[0.3, f64::NAN, 0.7]), vec![0, 1, 2]);
    }

    #[test]
    fn cosine_prefers_the_aligned_cause() {
        let params = ModelParams::new(array![[1.0, 0.0], [0.0, 1.0]], 0.5, 1.0);
        let y = array![1.0, 0.1];

        let mut scores = Vec::new();
        cosine_scores(y.view(), &params, false, &mut scores);
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn absolute_scores_ignore_sign() {
        let params = ModelParams::new(array![[-1.0, 0.2], [0.0, 0.2]], 0.5, 1.0);
        let y = array![1.0, 0.0];

        let mut plain = Vec::new();
        cosine_scores(y.view(), &params, false, &mut plain);
        assert!(plain[0] < 0.0);

        let mut abs = Vec::new();
        cosine_scores(y.view(), &params, true, &mut abs);
        assert!(abs[0] > abs[1]);
    }
}
