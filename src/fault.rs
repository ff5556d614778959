//! # Summary
//!
//! Injectable acceptor faults. A replica consults its policy before every
//! `prepare` and `accept`; the default policy never interferes. Concrete
//! injectors exist only for tests and behind the `fault-injection` feature.

use crate::message::ProposalNumber;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Accept,
}

pub trait FaultPolicy: Send + Sync {
    /// Returns true to make the acceptor refuse `proposal` in `phase`.
    fn reject(&self, phase: Phase, proposal: &ProposalNumber) -> bool;
}

/// Never rejects.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoFaults;

impl FaultPolicy for NoFaults {
    fn reject(&self, _: Phase, _: &ProposalNumber) -> bool {
        false
    }
}

/// Rejects every proposal whose round is a multiple of `divisor`.
#[cfg(any(test, feature = "fault-injection"))]
#[derive(Copy, Clone, Debug)]
pub struct RejectDivisible {
    pub divisor: u64,
}

#[cfg(any(test, feature = "fault-injection"))]
impl FaultPolicy for RejectDivisible {
    fn reject(&self, _: Phase, proposal: &ProposalNumber) -> bool {
        self.divisor != 0 && proposal.round % self.divisor == 0
    }
}

/// Rejects everything.
#[cfg(any(test, feature = "fault-injection"))]
#[derive(Copy, Clone, Debug, Default)]
pub struct RejectAll;

#[cfg(any(test, feature = "fault-injection"))]
impl FaultPolicy for RejectAll {
    fn reject(&self, _: Phase, _: &ProposalNumber) -> bool {
        true
    }
}
