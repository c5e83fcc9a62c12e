use std::fmt;

/// Errors produced by the EM core while evaluating or updating a model.
#[derive(Debug)]
pub enum EmError {
    /// An invalid configuration was detected before training started.
    Config(ConfigError),

    /// A NaN or infinity surfaced in a posterior, joint or update.
    ///
    /// Never masked or clamped: the driver escalates this to the whole
    /// run so the caller can decide on recovery.
    Numerical {
        /// Which computation produced the non-finite value.
        context: &'static str,
    },

    /// A shape invariant was violated (e.g. mismatched buffer lengths).
    Shape {
        what: &'static str,
        got: usize,
        expected: usize,
    },
}

impl fmt::Display for EmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmError::Config(e) => write!(f, "configuration error: {e}"),
            EmError::Numerical { context } => {
                write!(f, "non-finite value in {context}")
            }
            EmError::Shape {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
        }
    }
}

impl std::error::Error for EmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for EmError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Invalid model/parameter combinations, rejected before any worker
/// does useful work.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// More simultaneously active causes than preselected candidates.
    GammaExceedsHprime { gamma: usize, hprime: usize },

    /// The convergence tolerance must be finite and positive.
    InvalidTolerance(f64),

    /// A discrete value set must contain at least one non-zero value.
    EmptyValueSet,

    /// A discrete value set entry is zero or non-finite.
    InvalidValueSet(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::GammaExceedsHprime { gamma, hprime } => write!(
                f,
                "gamma ({gamma}) must not exceed the preselection width Hprime ({hprime})"
            ),
            ConfigError::InvalidTolerance(tol) => {
                write!(f, "convergence tolerance {tol} is not finite and positive")
            }
            ConfigError::EmptyValueSet => {
                write!(f, "discrete value set must contain at least one non-zero value")
            }
            ConfigError::InvalidValueSet(v) => {
                write!(f, "discrete value set entry {v} is zero or non-finite")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
