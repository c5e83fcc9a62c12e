//! The per-point truncated E-step: preselect, expand, score, normalize.
//!
//! Public so exact-enumeration references and scenario tests can call
//! the production posterior path directly.

use em_core::{CandidateState, CausesModel, EmError, ModelParams, math};
use ndarray::ArrayView1;

/// Posterior over the truncated state space of one data point.
#[derive(Debug)]
pub struct TruncatedPosterior {
    /// Candidate states, empty state first.
    pub space: Vec<CandidateState>,
    /// Normalized responsibilities, aligned with `space`.
    pub responsibilities: Vec<f64>,
    /// log Σ_s p(y, s | θ) over the truncated space; this point's
    /// free-energy contribution.
    pub log_norm: f64,
}

/// Runs the full truncated E-step for one data point.
///
/// Ranks causes by the model's preselection score, keeps the top
/// `hprime`, expands them into at most `budget` candidate states and
/// normalizes the log-joints into responsibilities.
///
/// # Errors
/// `EmError::Numerical` when a log-joint or the normalizer comes out
/// non-finite; instability is reported, never papered over.
pub fn truncated_posterior(
    model: &dyn CausesModel,
    y: ArrayView1<'_, f64>,
    params: &ModelParams,
    hprime: usize,
    budget: usize,
) -> Result<TruncatedPosterior, EmError> {
    let mut scores = Vec::new();
    model.preselection_score(y, params, &mut scores);

    let ranked = ca_models::preselect::rank_causes(&scores);
    let candidates: Vec<usize> = ranked.into_iter().take(hprime).collect();

    let space = model.expand_states(&candidates, budget);

    let mut log_weights = Vec::with_capacity(space.len());
    for state in &space {
        let lj = model.log_joint(y, state, params);
        if lj.is_nan() || lj == f64::INFINITY {
            return Err(EmError::Numerical {
                context: "log-joint evaluation",
            });
        }
        log_weights.push(lj);
    }

    let log_norm = math::normalize_responsibilities(&mut log_weights);
    if !log_norm.is_finite() {
        // Every state at -inf means the point is unexplainable under
        // the current parameters.
        return Err(EmError::Numerical {
            context: "posterior normalization",
        });
    }

    Ok(TruncatedPosterior {
        space,
        responsibilities: log_weights,
        log_norm,
    })
}
