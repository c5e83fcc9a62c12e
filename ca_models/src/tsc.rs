//! Ternary Sparse Coding: latents in {-1, 0, +1}. An active cause takes
//! either sign with prior π/2; superposition and noise are the same
//! linear-Gaussian machinery as BSC.

use em_core::{
    Activation, CandidateState, CausesModel, EmError, ModelParams, SuffStats, enumerate_subsets,
};
use ndarray::ArrayView1;
use rand::RngCore;

use crate::{linear, preselect};

pub struct Tsc {
    d: usize,
    h: usize,
    gamma: usize,
}

impl Tsc {
    pub fn new(d: usize, h: usize, gamma: usize) -> Self {
        Self { d, h, gamma }
    }
}

impl CausesModel for Tsc {
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
        let prior = k * (params.pi / 2.0).ln() + (self.h as f64 - k) * (1.0 - params.pi).ln();
        prior + linear::log_gaussian(y, state, params)
    }

    fn preselection_score(
        &self,
        y: ArrayView1<'_, f64>,
        params: &ModelParams,
        scores: &mut Vec<f64>,
    ) {
        // Either sign of the activation can explain the data, so the
        // correlation sign is uninformative.
        preselect::cosine_scores(y, params, true, scores);
    }

    /// Expands each subset into all 2^k sign assignments, +1 before -1
    /// per position, in deterministic order.
    fn expand_states(&self, candidates: &[usize], budget: usize) -> Vec<CandidateState> {
        let mut states = vec![CandidateState::empty()];

        'outer: for subset in enumerate_subsets(candidates, self.gamma) {
            let k = subset.len();
            for pattern in 0u32..(1 << k) {
                if states.len() >= budget {
                    break 'outer;
                }

                let activations = subset
                    .iter()
                    .enumerate()
                    .map(|(bit, &cause)| Activation {
                        cause,
                        value: if pattern & (1 << bit) == 0 { 1.0 } else { -1.0 },
                    })
                    .collect();
                states.push(CandidateState::new(activations));
            }
        }

        states
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
    use ndarray::array;

    #[test]
    fn sign_expansion_counts() {
        let model = Tsc::new(2, 3, 2);
        let states = model.expand_states(&[0, 1, 2], 1000);
        // empty + 3·2 singletons + 3·4 pairs.
        assert_eq!(states.len(), 1 + 6 + 12);
        assert!(states[0].is_empty());
        // First non-empty state is the best-ranked cause, positive.
        assert_eq!(states[1].activations()[0].value, 1.0);
        assert_eq!(states[2].activations()[0].value, -1.0);
    }

    #[test]
    fn negated_cause_explains_negated_data() {
        let model = Tsc::new(2, 2, 1);
        let params = ModelParams::new(array![[1.0, 0.0], [0.0, 1.0]], 0.2, 0.5);
        let y = array![-1.0, 0.0];

        let pos = model.log_joint(
            y.view(),
            &CandidateState::new(vec![Activation { cause: 0, value: 1.0 }]),
            &params,
        );
        let neg = model.log_joint(
            y.view(),
            &CandidateState::new(vec![Activation { cause: 0, value: -1.0 }]),
            &params,
        );
        assert!(neg > pos);
    }
}
