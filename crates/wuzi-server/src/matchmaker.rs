//! FIFO matchmaking queue.
//!
//! The queue knows nothing about transports or sessions: it orders
//! waiting client ids and, as soon as it holds two, hands the oldest
//! pair back with seats already assigned. The caller owns the single
//! serialization point around it (a mutex on the server state) and is
//! responsible for rejecting clients that are already seated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use uuid::Uuid;

/// Result of an [`Matchmaker::enqueue`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The id was already waiting; nothing changed.
    AlreadyQueued,
    /// Entered the queue, no opponent yet.
    Queued,
    /// The two oldest entries were paired and removed. Seat assignment
    /// between them is randomized.
    Paired { seat_one: Uuid, seat_two: Uuid },
}

/// FIFO pairing queue with its own seedable randomness for seat
/// assignment.
pub struct Matchmaker {
    queue: VecDeque<Uuid>,
    rng: StdRng,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic seat assignment for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            queue: VecDeque::new(),
            rng,
        }
    }

    /// Append `id` to the queue tail and pair the two oldest entries if
    /// the queue now holds two. Re-enqueueing a waiting id is a no-op.
    pub fn enqueue(&mut self, id: Uuid) -> EnqueueOutcome {
        if self.queue.contains(&id) {
            return EnqueueOutcome::AlreadyQueued;
        }
        self.queue.push_back(id);

        if self.queue.len() < 2 {
            return EnqueueOutcome::Queued;
        }

        // Both unwraps guarded by the length check above.
        let first = self.queue.pop_front().expect("queue holds two entries");
        let second = self.queue.pop_front().expect("queue holds two entries");
        let (seat_one, seat_two) = if self.rng.gen_bool(0.5) {
            (first, second)
        } else {
            (second, first)
        };
        EnqueueOutcome::Paired { seat_one, seat_two }
    }

    /// Remove `id` from the queue. Returns whether it was waiting.
    pub fn cancel(&mut self, id: Uuid) -> bool {
        let before = self.queue.len();
        self.queue.retain(|&queued| queued != id);
        self.queue.len() != before
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new()
    }
}
