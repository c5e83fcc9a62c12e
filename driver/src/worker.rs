//! The per-rank training loop.
//!
//! Every worker runs the same code over its own shard: local E-step,
//! one flat reduction, and a parameter broadcast from rank 0. A worker
//! that fails locally poisons the group and keeps its collective
//! schedule, so peers fail at the same call instead of hanging.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use collectives::Communicator;
use em_core::{CausesModel, DataSet, ModelParams};
use log::{debug, info};
use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    DriverError, ResultsSink, TrainingConfig,
    error::Result,
    estep::truncated_posterior,
    session::RunOutcome,
};

/// Everything one worker task owns for the duration of a run.
pub(crate) struct WorkerContext {
    pub comm: Communicator<ModelParams>,
    pub shard: Vec<usize>,
    pub dataset: Arc<DataSet>,
    pub config: TrainingConfig,
    pub abort: Arc<AtomicBool>,
    pub sink: Arc<Mutex<dyn ResultsSink>>,
}

/// What one worker hands back after its loop ends.
pub(crate) struct WorkerReport {
    pub outcome: RunOutcome,
    pub iterations: usize,
    pub bound: f64,
    pub params: ModelParams,
}

/// Seeds identical parameters on every rank from globally reduced data
/// moments. The reduction is bit-deterministic and the RNG seed is
/// shared, so no parameter broadcast is needed here.
async fn reduce_initial_params(
    ctx: &WorkerContext,
    model: &dyn CausesModel,
) -> Result<ModelParams> {
    let d = ctx.dataset.dim();

    // Layout: per-dim sums, per-dim squared sums, point count.
    let mut moments = vec![0.0; 2 * d + 1];
    for &index in &ctx.shard {
        let y = ctx.dataset.point(index)?;
        for (j, &v) in y.iter().enumerate() {
            moments[j] += v;
            moments[d + j] += v * v;
        }
        moments[2 * d] += 1.0;
    }

    let reduced = ctx.comm.reduce_sum(&moments).await?;
    let n = reduced[2 * d];

    let mean: Vec<f64> = reduced[..d].iter().map(|&s| s / n).collect();
    let var = (0..d)
        .map(|j| reduced[d + j] / n - mean[j] * mean[j])
        .sum::<f64>()
        / d as f64;
    let std = if var > 0.0 { var.sqrt() } else { 1.0 };

    let mut rng = StdRng::seed_from_u64(ctx.config.seed);
    Ok(model.init_params(&mean, std, &mut rng))
}

/// Poisons the group, then spends one reduction slot so every peer
/// observes the failure at its next collective.
async fn poison_and_yield(ctx: &WorkerContext, detail: String, flat_len: usize) {
    ctx.comm.poison(detail);
    let _ = ctx.comm.reduce_sum(&vec![0.0; flat_len + 1]).await;
}

pub(crate) async fn run_worker(ctx: WorkerContext) -> Result<WorkerReport> {
    let cfg = &ctx.config;
    let rank = ctx.comm.rank();
    let d = ctx.dataset.dim();
    let h = cfg.latents.get();

    let model = ca_models::from_spec(&cfg.variant, d, h, cfg.effective_gamma(h))?;
    let hprime = cfg.effective_hprime(h);
    let budget = cfg.states_budget.get();

    let mut params = reduce_initial_params(&ctx, &*model).await?;
    debug!(rank, shard_len = ctx.shard.len(); "worker initialized");

    let mut local = model.empty_stats();
    let mut global = model.empty_stats();
    let flat_len = local.flat_len();

    let mut previous_bound = f64::NAN;
    let mut streak = 0usize;
    let mut bound = f64::NAN;
    let mut iterations = 0usize;
    let mut outcome = RunOutcome::MaxIterationsReached;

    for iteration in 1..=cfg.max_iterations.get() {
        iterations = iteration;
        local.reset();

        for &index in &ctx.shard {
            let y = ctx.dataset.point(index)?;
            let posterior = match truncated_posterior(&*model, y, &params, hprime, budget) {
                Ok(posterior) => posterior,
                Err(source) => {
                    poison_and_yield(&ctx, source.to_string(), flat_len).await;
                    return Err(DriverError::Instability {
                        iteration,
                        rank,
                        source,
                    });
                }
            };

            model.accumulate_statistics(
                y,
                &posterior.space,
                &posterior.responsibilities,
                &params,
                &mut local,
            );
            local.add_point();
            local.add_free_energy(posterior.log_norm);
        }

        // One flat reduction per iteration; the trailing element carries
        // the abort votes.
        let mut operand = local.flatten();
        operand.push(if ctx.abort.load(Ordering::Relaxed) {
            1.0
        } else {
            0.0
        });

        let reduced = ctx.comm.reduce_sum(&operand).await?;
        let abort_votes = reduced[flat_len];
        global.unflatten(&reduced[..flat_len])?;

        let n_total = global.points() as usize;
        bound = global.free_energy() / n_total as f64;

        if abort_votes > 0.0 {
            debug!(rank, iteration; "abort observed at iteration boundary");
            outcome = RunOutcome::Aborted;
            break;
        }

        // M-step on the root only; everyone else waits for the result.
        params = if ctx.comm.is_root() {
            match model.m_step(&global, n_total, &params) {
                Ok(next) => ctx.comm.broadcast(Some(next)).await?,
                Err(source) => {
                    ctx.comm.poison(source.to_string());
                    let _ = ctx.comm.broadcast(None).await;
                    return Err(DriverError::Instability {
                        iteration,
                        rank,
                        source,
                    });
                }
            }
        } else {
            ctx.comm.broadcast(None).await?
        };

        // Same reduced bound on every rank, so the streak logic needs
        // no extra coordination.
        if previous_bound.is_finite() {
            let scale = previous_bound.abs().max(f64::MIN_POSITIVE);
            if (bound - previous_bound).abs() / scale <= cfg.tolerance {
                streak += 1;
            } else {
                streak = 0;
            }
        }
        previous_bound = bound;

        let converged = streak >= cfg.patience.get();
        let stopping = converged || iteration == cfg.max_iterations.get();

        if ctx.comm.is_root() {
            info!(iteration, bound; "iteration complete");
            // Bind the result so the sink guard drops before any await.
            let recorded = ctx.sink.lock().record_iteration(iteration, &params, bound);
            if let Err(e) = recorded {
                // Peers that keep iterating block at their next
                // reduction, so spend one slot there; when every rank
                // stops this iteration, nobody is waiting.
                if stopping {
                    ctx.comm.poison(format!("results sink failure: {e}"));
                } else {
                    poison_and_yield(&ctx, format!("results sink failure: {e}"), flat_len)
                        .await;
                }
                return Err(DriverError::Sink(e));
            }
        }

        if converged {
            outcome = RunOutcome::Converged;
            break;
        }
    }

    debug!(rank, iterations, outcome = outcome.as_str(); "worker finished");
    Ok(WorkerReport {
        outcome,
        iterations,
        bound,
        params,
    })
}
