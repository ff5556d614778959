//! # Summary
//!
//! Source of proposal numbers. Each replica counts rounds locally and tags
//! them with its own identity, so numbers are unique across the cluster and
//! strictly increase on every replica. Observing a higher round elsewhere
//! pulls the counter forward, which lets a losing proposer overtake the
//! winner on its next attempt.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::message::{ProposalNumber, ReplicaId};

#[derive(Debug)]
pub struct ProposalClock {
    replica: ReplicaId,
    round: AtomicU64,
}

impl ProposalClock {
    pub fn new(replica: ReplicaId) -> Self {
        ProposalClock {
            replica,
            round: AtomicU64::new(0),
        }
    }

    /// Returns a number strictly greater than any this clock has
    /// produced or observed.
    pub fn tick(&self) -> ProposalNumber {
        let round = self.round.fetch_add(1, Ordering::SeqCst) + 1;
        ProposalNumber { round, replica: self.replica.clone() }
    }

    pub fn observe(&self, seen: &ProposalNumber) {
        self.round.fetch_max(seen.round, Ordering::SeqCst);
    }
}
