//! # Summary
//!
//! The three Paxos roles. Every replica plays all of them at once.
//!
//! `acceptor` and `learner` are synchronous transitions on `ReplicaState`,
//! always run under the replica's lock. `proposer` is the only role that
//! talks to other replicas, and never holds the lock while doing so.

/// Promise and accept bookkeeping.
pub(crate) mod acceptor;

/// Applies agreed transactions to the store.
pub(crate) mod learner;

/// Drives one transaction through prepare, accept and learn.
pub mod proposer;
