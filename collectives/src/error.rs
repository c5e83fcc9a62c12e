use std::fmt;

/// A worker-local failure lifted into the collective so the whole group
/// fails together instead of hanging at the next barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poison {
    /// Rank that recorded the failure.
    pub rank: usize,
    /// Human-readable description of the original failure.
    pub detail: String,
}

impl Poison {
    pub fn new(rank: usize, detail: impl Into<String>) -> Self {
        Self {
            rank,
            detail: detail.into(),
        }
    }
}

/// Failures surfaced by collective calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectiveError {
    /// A peer recorded a poison; every rank observes this at the same
    /// collective call.
    Poisoned(Poison),

    /// Operands of mismatched length were contributed to a reduction.
    Shape {
        rank: usize,
        got: usize,
        expected: usize,
    },

    /// The collective protocol was violated (e.g. a broadcast with no
    /// source, or a missing contribution).
    Protocol(&'static str),
}

impl fmt::Display for CollectiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectiveError::Poisoned(p) => {
                write!(f, "collective poisoned by rank {}: {}", p.rank, p.detail)
            }
            CollectiveError::Shape {
                rank,
                got,
                expected,
            } => write!(
                f,
                "rank {rank} contributed a reduction operand of length {got}, expected {expected}"
            ),
            CollectiveError::Protocol(msg) => write!(f, "collective protocol violation: {msg}"),
        }
    }
}

impl std::error::Error for CollectiveError {}
