//! Discrete Sparse Coding: each latent is either off or takes one value
//! from a configured finite set {φ₁ … φ_V}, with prior π spread
//! uniformly over the non-zero values. Superposition and noise follow
//! the linear-Gaussian machinery.

use em_core::{
    Activation, CandidateState, CausesModel, ConfigError, EmError, ModelParams, SuffStats,
    enumerate_subsets,
};
use ndarray::ArrayView1;
use rand::RngCore;

use crate::{linear, preselect};

pub struct Dsc {
    d: usize,
    h: usize,
    gamma: usize,
    values: Vec<f64>,
}

impl Dsc {
    /// # Errors
    /// Rejects an empty value set and zero or non-finite values.
    pub fn new(d: usize, h: usize, gamma: usize, values: Vec<f64>) -> Result<Self, ConfigError> {
        if values.is_empty() {
            return Err(ConfigError::EmptyValueSet);
        }

        if let Some(&bad) = values.iter().find(|v| !v.is_finite() || **v == 0.0) {
            return Err(ConfigError::InvalidValueSet(bad));
        }

        Ok(Self {
            d,
            h,
            gamma,
            values,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl CausesModel for Dsc {
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
        let per_value = params.pi / self.values.len() as f64;
        let prior = k * per_value.ln() + (self.h as f64 - k) * (1.0 - params.pi).ln();
        prior + linear::log_gaussian(y, state, params)
    }

    fn preselection_score(
        &self,
        y: ArrayView1<'_, f64>,
        params: &ModelParams,
        scores: &mut Vec<f64>,
    ) {
        // Negative values in the set can flip the correlation sign.
        preselect::cosine_scores(y, params, true, scores);
    }

    /// Expands each subset into the V^k assignments of configured
    /// values, mixed-radix order over the value set.
    fn expand_states(&self, candidates: &[usize], budget: usize) -> Vec<CandidateState> {
        let mut states = vec![CandidateState::empty()];
        let v = self.values.len();

        'outer: for subset in enumerate_subsets(candidates, self.gamma) {
            let k = subset.len();
            let mut digits = vec![0usize; k];

            loop {
                if states.len() >= budget {
                    break 'outer;
                }

                let activations = subset
                    .iter()
                    .zip(&digits)
                    .map(|(&cause, &digit)| Activation {
                        cause,
                        value: self.values[digit],
                    })
                    .collect();
                states.push(CandidateState::new(activations));

                // Mixed-radix increment; done when every digit wrapped.
                let mut pos = 0;
                loop {
                    if pos == k {
                        break;
                    }
                    digits[pos] += 1;
                    if digits[pos] < v {
                        break;
                    }
                    digits[pos] = 0;
                    pos += 1;
                }
                if pos == k {
                    break;
                }
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
