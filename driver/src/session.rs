//! Run orchestration: spawns one task per worker rank, joins them and
//! consolidates their reports into a single run report.

use std::io;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use collectives::{CollectiveError, CommGroup, partition, partition_shuffled};
use em_core::{DataSet, ModelParams};
use log::info;
use parking_lot::Mutex;
use tokio::runtime::Runtime;

use crate::{
    DriverError, ResultsSink, TrainingConfig,
    error::Result,
    worker::{WorkerContext, run_worker},
};

/// How a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The bound improvement stayed under tolerance long enough.
    Converged,
    /// The iteration budget ran out first.
    MaxIterationsReached,
    /// An abort request was honored at an iteration boundary.
    Aborted,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Converged => "converged",
            RunOutcome::MaxIterationsReached => "max-iterations",
            RunOutcome::Aborted => "aborted",
        }
    }
}

/// The consolidated result of one run: rank 0's view, which every rank
/// agrees with by construction.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub iterations: usize,
    pub bound: f64,
    pub params: ModelParams,
}

/// Requests a graceful stop of the session's run.
///
/// Cloneable and cheap; safe to trigger from any thread. The request
/// is honored at the next iteration boundary, never mid-iteration.
#[derive(Clone)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

/// A training session: owns the async runtime the worker tasks run on
/// and presents a blocking façade to the caller.
pub struct Session {
    runtime: Runtime,
    abort: Arc<AtomicBool>,
}

impl Session {
    /// # Errors
    /// Fails only if the underlying runtime cannot be built.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            runtime: Runtime::new()?,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle that aborts this session's run at the next iteration
    /// boundary. A request raised before `run` aborts the run during
    /// its first iteration.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            flag: Arc::clone(&self.abort),
        }
    }

    /// Runs one training job to completion and blocks until every
    /// worker has joined.
    ///
    /// # Errors
    /// Configuration problems are reported before any worker starts.
    /// When workers fail, the originating failure is preferred over the
    /// `Poisoned` echoes the other ranks observe.
    pub fn run(
        &self,
        config: &TrainingConfig,
        dataset: Arc<DataSet>,
        sink: Arc<Mutex<dyn ResultsSink>>,
    ) -> Result<RunReport> {
        config.validate()?;

        let workers = config.workers.get();
        let shards: Vec<Vec<usize>> = match config.shuffle {
            Some(seed) => partition_shuffled(dataset.len(), workers, seed),
            None => partition(dataset.len(), workers)
                .into_iter()
                .map(|range| range.collect())
                .collect(),
        };

        info!(
            workers,
            points = dataset.len(),
            model = config.variant.kind();
            "starting training run"
        );

        let comms = CommGroup::create::<ModelParams>(workers);

        self.runtime.block_on(async {
            let handles: Vec<_> = comms
                .into_iter()
                .zip(shards)
                .map(|(comm, shard)| {
                    let ctx = WorkerContext {
                        comm,
                        shard,
                        dataset: Arc::clone(&dataset),
                        config: config.clone(),
                        abort: Arc::clone(&self.abort),
                        sink: Arc::clone(&sink),
                    };
                    tokio::spawn(run_worker(ctx))
                })
                .collect();

            let mut root_report = None;
            let mut failure: Option<DriverError> = None;

            for (rank, handle) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(Ok(report)) => {
                        if rank == 0 {
                            root_report = Some(report);
                        }
                    }
                    Ok(Err(error)) => {
                        // The poisoning rank's own error explains the
                        // run; peers only echo it as `Poisoned`. Keep
                        // the explanation, not an echo.
                        let is_echo = |e: &DriverError| {
                            matches!(e, DriverError::Collective(CollectiveError::Poisoned(_)))
                        };
                        let replace = match &failure {
                            None => true,
                            Some(kept) => is_echo(kept) && !is_echo(&error),
                        };
                        if replace {
                            failure = Some(error);
                        }
                    }
                    Err(_) => {
                        if failure.is_none() {
                            failure = Some(DriverError::WorkerPanicked { rank });
                        }
                    }
                }
            }

            match failure {
                Some(error) => Err(error),
                None => root_report
                    .map(|report| RunReport {
                        outcome: report.outcome,
                        iterations: report.iterations,
                        bound: report.bound,
                        params: report.params,
                    })
                    .ok_or(DriverError::WorkerPanicked { rank: 0 }),
            }
        })
    }
}
