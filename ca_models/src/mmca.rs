//! Maximum-Magnitude Causes Analysis: like MCA, causes compete per
//! dimension, but the winner is the field entry of largest magnitude,
//! so the fields may carry either sign.

use em_core::{CandidateState, CausesModel, EmError, ModelParams, SuffStats};
use ndarray::ArrayView1;
use rand::RngCore;

use crate::{
    linear,
    mca::{competitive_accumulate, competitive_log_gaussian, competitive_m_step},
    preselect,
};

pub struct Mmca {
    d: usize,
    h: usize,
    gamma: usize,
}

impl Mmca {
    pub fn new(d: usize, h: usize, gamma: usize) -> Self {
        Self { d, h, gamma }
    }
}

/// Winner by absolute magnitude, value keeps its sign. Ties break on
/// the lowest cause index.
fn magnitude_winner(
    state: &CandidateState,
    params: &ModelParams,
    dim: usize,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for a in state.activations() {
        let w = params.weights[[dim, a.cause]];
        match best {
            Some((_, value)) if value.abs() >= w.abs() => {}
            _ => best = Some((a.cause, w)),
        }
    }
    best
}

impl CausesModel for Mmca {
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
        prior + competitive_log_gaussian(y, state, params, magnitude_winner)
    }

    fn preselection_score(
        &self,
        y: ArrayView1<'_, f64>,
        params: &ModelParams,
        scores: &mut Vec<f64>,
    ) {
        // Signed fields: magnitude of alignment is what matters.
        preselect::cosine_scores(y, params, true, scores);
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
        competitive_accumulate(y, space, responsibilities, params, stats, magnitude_winner);
    }

    fn m_step(
        &self,
        stats: &SuffStats,
        n_total: usize,
        params: &ModelParams,
    ) -> Result<ModelParams, EmError> {
        competitive_m_step(stats, n_total, params, self.gamma, false)
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

    #[test]
    fn negative_magnitude_wins_over_smaller_positive() {
        let params = ModelParams::new(array![[-2.0, 1.0]], 0.3, 0.5);
        let model = Mmca::new(1, 2, 2);
        let both = CandidateState::new(vec![
            Activation { cause: 0, value: 1.0 },
            Activation { cause: 1, value: 1.0 },
        ]);

        // Combined mean is -2 (|−2| > |1|), so y = −2 fits perfectly.
        let at_winner = model.log_joint(array![-2.0].view(), &both, &params);
        let at_loser = model.log_joint(array![1.0].view(), &both, &params);
        assert!(at_winner > at_loser);
    }

    #[test]
    fn m_step_allows_signed_fields() {
        let params = ModelParams::new(array![[-2.0, 1.0]], 0.3, 0.5);
        let model = Mmca::new(1, 2, 2);

        let mut stats = model.empty_stats();
        stats.wp_mut()[[0, 0]] = -3.0;
        stats.wq_mut()[[0, 0]] = 1.0;
        stats.add_pi(0.5);
        stats.add_sigma(0.5);
        stats.add_point();

        let next = model.m_step(&stats, 1, &params).unwrap();
        assert_eq!(next.weights[[0, 0]], -3.0);
    }
}
