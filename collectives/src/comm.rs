//! Blocking collective primitives over a barrier-with-payload.
//!
//! Every collective is a fixed sequence of barrier waits around a
//! shared payload slot. Contributions are written strictly between the
//! first and second barrier and summed in rank order by whichever task
//! the barrier elects, so the reduced value is bit-identical on every
//! rank and independent of scheduling.
//!
//! Every worker must reach the same collective calls, in the same
//! order, the same number of times — that obligation sits on the
//! caller. What this module does guarantee: a worker that fails locally
//! can record a poison and keep participating, and every peer then
//! observes the same `Poisoned` error at the same collective instead of
//! hanging at a barrier forever.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use tokio::sync::Barrier;

use crate::{CollectiveError, Poison};

struct Slot<T> {
    contributions: Vec<Option<Vec<f64>>>,
    reduced: Option<Vec<f64>>,
    fault: Option<CollectiveError>,
    payload: Option<T>,
    readers: usize,
    poison: Option<Poison>,
}

struct Shared<T> {
    size: usize,
    barrier: Barrier,
    slot: Mutex<Slot<T>>,
}

/// One worker's handle into the collective group.
///
/// Cheap to clone into a task; all handles of a group share one barrier
/// and one payload slot.
pub struct Communicator<T> {
    rank: usize,
    shared: Arc<Shared<T>>,
}

/// Factory for the fixed set of communicators of one training run.
pub struct CommGroup;

impl CommGroup {
    /// Creates `size` communicators, one per rank, sharing one group.
    pub fn create<T: Clone + Send>(size: usize) -> Vec<Communicator<T>> {
        assert!(size > 0, "a collective group needs at least one rank");

        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slot: Mutex::new(Slot {
                contributions: vec![None; size],
                reduced: None,
                fault: None,
                payload: None,
                readers: 0,
                poison: None,
            }),
        });

        (0..size)
            .map(|rank| Communicator {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl<T: Clone + Send> Communicator<T> {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Rank 0: the designated M-step runner and results recorder.
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    /// Records a worker-local failure without leaving the collective
    /// sequence. Every rank (this one included) observes `Poisoned` at
    /// its next collective call. The first recorded poison wins.
    pub fn poison(&self, detail: impl Into<String>) {
        let mut slot = self.shared.slot.lock();
        if slot.poison.is_none() {
            let poison = Poison::new(self.rank, detail);
            debug!(rank = self.rank; "poisoning collective group: {}", poison.detail);
            slot.poison = Some(poison);
        }
    }

    /// Elementwise sum of `operand` across all ranks.
    ///
    /// Collective and blocking: every rank must call it with an operand
    /// of identical length. The result is summed in rank order, so it
    /// is bit-identical everywhere.
    ///
    /// # Errors
    /// `Poisoned` if any rank recorded a poison, `Shape` if operand
    /// lengths disagree.
    pub async fn reduce_sum(&self, operand: &[f64]) -> Result<Vec<f64>, CollectiveError> {
        // Align: everyone finished reading the previous collective.
        self.shared.barrier.wait().await;

        {
            let mut slot = self.shared.slot.lock();
            slot.contributions[self.rank] = Some(operand.to_vec());
        }

        // All contributions are in; the elected leader folds them.
        if self.shared.barrier.wait().await.is_leader() {
            let mut slot = self.shared.slot.lock();
            slot.fault = None;

            let expected = operand.len();
            let mut sum = vec![0.0; expected];
            for rank in 0..self.shared.size {
                match slot.contributions[rank].take() {
                    Some(contribution) if contribution.len() == expected => {
                        for (acc, v) in sum.iter_mut().zip(&contribution) {
                            *acc += v;
                        }
                    }
                    Some(contribution) => {
                        slot.fault = Some(CollectiveError::Shape {
                            rank,
                            got: contribution.len(),
                            expected,
                        });
                    }
                    None => {
                        slot.fault = Some(CollectiveError::Protocol(
                            "a rank reached the reduction without contributing",
                        ));
                    }
                }
            }

            slot.reduced = Some(sum);
        }

        self.shared.barrier.wait().await;

        let slot = self.shared.slot.lock();
        if let Some(poison) = &slot.poison {
            return Err(CollectiveError::Poisoned(poison.clone()));
        }
        if let Some(fault) = &slot.fault {
            return Err(fault.clone());
        }
        slot.reduced
            .clone()
            .ok_or(CollectiveError::Protocol("missing reduction result"))
    }

    /// Distributes one value from the single source rank to every rank.
    ///
    /// Exactly one rank must pass `Some`; every rank receives a clone.
    ///
    /// # Errors
    /// `Poisoned` if any rank recorded a poison, `Protocol` if no
    /// source supplied a value.
    pub async fn broadcast(&self, value: Option<T>) -> Result<T, CollectiveError> {
        self.shared.barrier.wait().await;

        if let Some(value) = value {
            let mut slot = self.shared.slot.lock();
            slot.payload = Some(value);
        }

        self.shared.barrier.wait().await;

        let mut slot = self.shared.slot.lock();
        let result = if let Some(poison) = &slot.poison {
            Err(CollectiveError::Poisoned(poison.clone()))
        } else {
            slot.payload
                .clone()
                .ok_or(CollectiveError::Protocol("broadcast without a source"))
        };

        // The last reader retires the payload for the next round.
        slot.readers += 1;
        if slot.readers == self.shared.size {
            slot.readers = 0;
            slot.payload = None;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn join_all<O: Send + 'static>(
        tasks: Vec<tokio::task::JoinHandle<O>>,
    ) -> Vec<O> {
        let mut out = Vec::new();
        for task in tasks {
            out.push(task.await.unwrap());
        }
        out
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reduce_sums_across_ranks() {
        let comms: Vec<Communicator<()>> = CommGroup::create(4);

        let tasks: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                tokio::spawn(async move {
                    let operand = vec![comm.rank() as f64, 1.0];
                    comm.reduce_sum(&operand).await.unwrap()
                })
            })
            .collect();

        for result in join_all(tasks).await {
            assert_eq!(result, vec![6.0, 4.0]);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn consecutive_reductions_do_not_bleed_into_each_other() {
        let comms: Vec<Communicator<()>> = CommGroup::create(3);

        let tasks: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                tokio::spawn(async move {
                    let first = comm.reduce_sum(&[1.0]).await.unwrap();
                    let second = comm.reduce_sum(&[2.0]).await.unwrap();
                    (first, second)
                })
            })
            .collect();

        for (first, second) in join_all(tasks).await {
            assert_eq!(first, vec![3.0]);
            assert_eq!(second, vec![6.0]);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broadcast_reaches_every_rank() {
        let comms: Vec<Communicator<u64>> = CommGroup::create(3);

        let tasks: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                tokio::spawn(async move {
                    let value = comm.is_root().then_some(42);
                    comm.broadcast(value).await.unwrap()
                })
            })
            .collect();

        for value in join_all(tasks).await {
            assert_eq!(value, 42);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn poison_fails_every_rank_at_the_same_collective() {
        let comms: Vec<Communicator<()>> = CommGroup::create(3);

        let tasks: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                tokio::spawn(async move {
                    if comm.rank() == 1 {
                        comm.poison("worker exploded");
                    }
                    comm.reduce_sum(&[1.0]).await
                })
            })
            .collect();

        for result in join_all(tasks).await {
            match result {
                Err(CollectiveError::Poisoned(p)) => {
                    assert_eq!(p.rank, 1);
                    assert_eq!(p.detail, "worker exploded");
                }
                other => panic!("expected a poisoned collective, got {other:?}"),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mismatched_operands_are_a_shape_error() {
        let comms: Vec<Communicator<()>> = CommGroup::create(2);

        let tasks: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                tokio::spawn(async move {
                    let operand = vec![0.0; comm.rank() + 1];
                    comm.reduce_sum(&operand).await
                })
            })
            .collect();

        let results = join_all(tasks).await;
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CollectiveError::Shape { .. }))));
    }
}
