use ndarray::ArrayView1;
use rand::RngCore;

use crate::{
    CandidateState, EmError, ModelParams, SuffStats,
    state::{Activation, enumerate_subsets},
};

/// The generative/likelihood contract one model variant must implement.
///
/// The truncated EM driver depends only on this trait, never on a
/// concrete variant. Implementations encapsulate all model-specific
/// mathematics: the joint of a data point with a candidate state, the
/// cheap preselection proxy, the posterior-weighted statistics and the
/// closed-form (or iterative) parameter update.
pub trait CausesModel: Send + Sync {
    /// (D, H) — observed and latent dimensionality.
    fn dims(&self) -> (usize, usize);

    /// Maximum number of simultaneously active causes per state.
    fn gamma(&self) -> usize;

    /// log p(y, s | θ) for one candidate state, computed in log space.
    ///
    /// Must stay finite for realistic parameter ranges; a non-finite
    /// result is treated as fatal by the driver, not clamped.
    fn log_joint(&self, y: ArrayView1<'_, f64>, state: &CandidateState, params: &ModelParams)
    -> f64;

    /// Writes one cheap per-cause score into `scores` (resized to H).
    ///
    /// A model-specific proxy used only to narrow the search; never the
    /// full joint. Higher means more promising.
    fn preselection_score(
        &self,
        y: ArrayView1<'_, f64>,
        params: &ModelParams,
        scores: &mut Vec<f64>,
    );

    /// Expands ranked candidate causes into concrete candidate states.
    ///
    /// The empty state comes first and is never truncated away; the
    /// remaining states are value assignments over every subset of
    /// `candidates` with at most `gamma()` members, in deterministic
    /// order, truncated to `budget` states in total.
    ///
    /// The default expansion is binary (active ⇒ value 1.0); ternary
    /// and discrete variants override it.
    fn expand_states(&self, candidates: &[usize], budget: usize) -> Vec<CandidateState> {
        let mut states = vec![CandidateState::empty()];

        for subset in enumerate_subsets(candidates, self.gamma()) {
            if states.len() >= budget {
                break;
            }
            let activations = subset
                .iter()
                .map(|&cause| Activation { cause, value: 1.0 })
                .collect();
            states.push(CandidateState::new(activations));
        }

        states
    }

    /// Fresh zeroed accumulator with the shapes this variant reduces.
    fn empty_stats(&self) -> SuffStats;

    /// Adds one data point's contribution to the running statistics,
    /// weighted by its normalized posterior over `space`. The point
    /// count and free-energy sums stay with the caller.
    fn accumulate_statistics(
        &self,
        y: ArrayView1<'_, f64>,
        space: &[CandidateState],
        responsibilities: &[f64],
        params: &ModelParams,
        stats: &mut SuffStats,
    );

    /// Produces the next parameter set from globally reduced statistics.
    ///
    /// Runs exactly once per iteration, on the reduced accumulator.
    /// Must be deterministic.
    ///
    /// # Errors
    /// Returns `EmError::Numerical` when an update produces a
    /// non-finite or out-of-domain parameter.
    fn m_step(
        &self,
        stats: &SuffStats,
        n_total: usize,
        params: &ModelParams,
    ) -> Result<ModelParams, EmError>;

    /// Seeds initial parameters from global data moments.
    ///
    /// Every worker calls this with identical `mean`/`std` (derived
    /// from a collective reduction) and an identically seeded `rng`,
    /// so all ranks hold bit-identical parameters before iteration one.
    fn init_params(&self, mean: &[f64], std: f64, rng: &mut dyn RngCore) -> ModelParams;
}
