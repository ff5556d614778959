//! # Summary
//!
//! Per-replica state. Everything in `ReplicaState` is guarded by the single
//! lock held in `shared::Shared`; the acceptor and learner roles mutate it
//! only through `&mut self` methods so no partial update is ever visible.

use hashbrown::{HashMap as Map, HashSet as Set};

use crate::message::{Op, ProposalNumber, Transaction, TransactionId};

/// Copy of a replica's key-value map.
pub type Snapshot = Map<String, String>;

/// The replicated key-value map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Store(Snapshot);

impl Store {
    pub fn get(&self, key: &str) -> Option<&String> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Put creates or overwrites; Delete of an absent key does nothing.
    pub fn apply(&mut self, transaction: &Transaction) {
        match &transaction.op {
        | Op::Put { key, value } => {
            self.0.insert(key.clone(), value.clone());
        }
        | Op::Delete { key } => {
            self.0.remove(key);
        }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.0.clone()
    }

    pub fn replace(&mut self, snapshot: Snapshot) {
        self.0 = snapshot;
    }
}

#[derive(Debug, Default)]
pub struct ReplicaState {
    /// Highest proposal this acceptor has promised
    pub(crate) highest_promised: Option<ProposalNumber>,

    /// Proposal of the most recently accepted value
    pub(crate) last_accepted_proposal: Option<ProposalNumber>,

    /// Most recently accepted value
    pub(crate) last_accepted_value: Option<Transaction>,

    /// Highest proposal applied by the learner
    pub(crate) last_learned_proposal: Option<ProposalNumber>,

    /// Transactions already applied to the store
    pub(crate) learned: Set<TransactionId>,

    pub(crate) store: Store,
}

impl ReplicaState {
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn highest_promised(&self) -> Option<&ProposalNumber> {
        self.highest_promised.as_ref()
    }

    pub fn last_accepted(&self) -> Option<(&ProposalNumber, &Transaction)> {
        self.last_accepted_proposal
            .as_ref()
            .zip(self.last_accepted_value.as_ref())
    }

    pub fn last_learned(&self) -> Option<&ProposalNumber> {
        self.last_learned_proposal.as_ref()
    }

    pub fn has_learned(&self, id: &TransactionId) -> bool {
        self.learned.contains(id)
    }
}
