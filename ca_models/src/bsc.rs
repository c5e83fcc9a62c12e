//! Binary Sparse Coding: binary latents, Bernoulli(π) prior, linear
//! superposition `y = W s + ε` with isotropic Gaussian noise.

use em_core::{CandidateState, CausesModel, EmError, ModelParams, SuffStats};
use ndarray::ArrayView1;
use rand::RngCore;

use crate::{linear, preselect};

pub struct Bsc {
    d: usize,
    h: usize,
    gamma: usize,
}

impl Bsc {
    pub fn new(d: usize, h: usize, gamma: usize) -> Self {
        Self { d, h, gamma }
    }
}

impl CausesModel for Bsc {
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
        prior + linear::log_gaussian(y, state, params)
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
        linear::accumulate(y, space, responsibilities, params, stats);
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

    fn model_and_params() -> (Bsc, ModelParams) {
        let params = ModelParams::new(array![[1.0, 0.0], [0.0, 1.0]], 0.25, 0.5);
        (Bsc::new(2, 2, 2), params)
    }

    #[test]
    fn empty_state_explains_the_zero_vector_best() {
        let (model, params) = model_and_params();
        let y = array![0.0, 0.0];

        let empty = model.log_joint(y.view(), &CandidateState::empty(), &params);
        let single = model.log_joint(
            y.view(),
            &CandidateState::new(vec![Activation { cause: 0, value: 1.0 }]),
            &params,
        );
        assert!(empty > single);
    }

    #[test]
    fn matching_cause_beats_the_empty_state() {
        let (model, params) = model_and_params();
        let y = array![1.0, 0.0];

        let empty = model.log_joint(y.view(), &CandidateState::empty(), &params);
        let matching = model.log_joint(
            y.view(),
            &CandidateState::new(vec![Activation { cause: 0, value: 1.0 }]),
            &params,
        );
        assert!(matching > empty);
    }

    #[test]
    fn default_expansion_is_binary_with_empty_first() {
        let (model, _) = model_and_params();
        let states = model.expand_states(&[0, 1], 16);

        assert!(states[0].is_empty());
        // empty + 2 singletons + 1 pair.
        assert_eq!(states.len(), 4);
        assert!(states.iter().all(|s| s
            .activations()
            .iter()
            .all(|a| a.value == 1.0)));
    }

    #[test]
    fn expansion_respects_the_state_budget() {
        let (model, _) = model_and_params();
        let states = model.expand_states(&[0, 1], 2);
        assert_eq!(states.len(), 2);
        assert!(states[0].is_empty());
    }
}
