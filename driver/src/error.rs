use std::{error::Error, fmt, io};

use collectives::CollectiveError;
use em_core::{ConfigError, DataError, EmError};

/// The driver's result type.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Everything that can end a training run abnormally.
#[derive(Debug)]
pub enum DriverError {
    /// Rejected before any worker did useful work.
    Config(ConfigError),

    /// The dataset could not be loaded or accessed.
    Data(DataError),

    /// NaN/Inf surfaced during a specific iteration on a specific rank.
    Instability {
        iteration: usize,
        rank: usize,
        source: EmError,
    },

    /// A model-level failure outside the numbered iterations.
    Em(EmError),

    /// A collective failed — typically the whole group observing one
    /// rank's poison.
    Collective(CollectiveError),

    /// The results sink refused a snapshot.
    Sink(io::Error),

    /// A worker task panicked instead of reporting an error.
    WorkerPanicked { rank: usize },
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Config(e) => write!(f, "configuration rejected: {e}"),
            DriverError::Data(e) => write!(f, "dataset error: {e}"),
            DriverError::Instability {
                iteration,
                rank,
                source,
            } => write!(
                f,
                "numerical instability at iteration {iteration} on rank {rank}: {source}"
            ),
            DriverError::Em(e) => write!(f, "model error: {e}"),
            DriverError::Collective(e) => write!(f, "collective failure: {e}"),
            DriverError::Sink(e) => write!(f, "results sink error: {e}"),
            DriverError::WorkerPanicked { rank } => {
                write!(f, "worker {rank} panicked")
            }
        }
    }
}

impl Error for DriverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DriverError::Config(e) => Some(e),
            DriverError::Data(e) => Some(e),
            DriverError::Instability { source, .. } => Some(source),
            DriverError::Em(e) => Some(e),
            DriverError::Collective(e) => Some(e),
            DriverError::Sink(e) => Some(e),
            DriverError::WorkerPanicked { .. } => None,
        }
    }
}

impl From<ConfigError> for DriverError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DataError> for DriverError {
    fn from(value: DataError) -> Self {
        Self::Data(value)
    }
}

impl From<EmError> for DriverError {
    fn from(value: EmError) -> Self {
        match value {
            EmError::Config(e) => Self::Config(e),
            other => Self::Em(other),
        }
    }
}

impl From<CollectiveError> for DriverError {
    fn from(value: CollectiveError) -> Self {
        Self::Collective(value)
    }
}

impl From<io::Error> for DriverError {
    fn from(value: io::Error) -> Self {
        Self::Sink(value)
    }
}
