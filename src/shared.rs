//! # Summary
//!
//! Central hub for one replica. Wraps the replica's state and membership
//! view with `Arc` and `parking_lot` locks so the server's connection tasks
//! and the local proposer can share them. The state lock is only held for
//! the duration of a single acceptor or learner transition.

use std::sync::Arc;

use hashbrown::HashMap as Map;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::clock::ProposalClock;
use crate::fault::{FaultPolicy, Phase};
use crate::message::{Accepted, Learned, Promise, ProposalNumber, Rejected, ReplicaId, Transaction, TransactionId};
use crate::peer::{Connector, Local, Peer};
use crate::state::{ReplicaState, Snapshot};

/// Known replicas other than this one.
pub type View = Map<ReplicaId, Arc<dyn Peer>>;

/// Thread-safe handle on a replica's state and membership view.
#[derive(Clone, Debug)]
pub struct Shared(Arc<Inner>);

#[derive(Derivative)]
#[derivative(Debug)]
struct Inner {
    id: ReplicaId,
    clock: ProposalClock,
    state: RwLock<ReplicaState>,
    view: RwLock<View>,
    #[derivative(Debug = "ignore")]
    faults: Arc<dyn FaultPolicy>,
    #[derivative(Debug = "ignore")]
    connector: Arc<dyn Connector>,
}

impl Shared {
    pub fn new(id: ReplicaId, faults: Arc<dyn FaultPolicy>, connector: Arc<dyn Connector>) -> Self {
        Shared(Arc::new(Inner {
            clock: ProposalClock::new(id.clone()),
            id,
            state: RwLock::new(ReplicaState::default()),
            view: RwLock::new(View::default()),
            faults,
            connector,
        }))
    }

    pub fn id(&self) -> &ReplicaId {
        &self.0.id
    }

    pub fn clock(&self) -> &ProposalClock {
        &self.0.clock
    }

    /// Acquires a read lock on the replica state.
    pub fn read(&self) -> RwLockReadGuard<ReplicaState> {
        self.0.state.read()
    }

    /// Acquires a write lock on the replica state.
    pub fn write(&self) -> RwLockWriteGuard<ReplicaState> {
        self.0.state.write()
    }

    pub fn prepare(&self, proposal: ProposalNumber) -> Result<Promise, Rejected> {
        self.0.clock.observe(&proposal);
        if self.0.faults.reject(Phase::Prepare, &proposal) {
            debug!("fault policy refused prepare {}", proposal);
            return Err(self.read().rejected(self.id()))
        }
        self.write().prepare(self.id(), proposal)
    }

    pub fn accept(&self, proposal: ProposalNumber, value: Transaction) -> Result<Accepted, Rejected> {
        self.0.clock.observe(&proposal);
        if self.0.faults.reject(Phase::Accept, &proposal) {
            debug!("fault policy refused accept {}", proposal);
            return Err(self.read().rejected(self.id()))
        }
        self.write().accept(self.id(), proposal, value)
    }

    pub fn learn(&self, accepted: &Accepted) -> Learned {
        self.write().learn(self.id(), accepted)
    }

    pub fn has_learned(&self, id: &TransactionId) -> bool {
        self.read().has_learned(id)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().store().get(key).cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read().store().snapshot()
    }

    /// Overwrites the whole store. Not coordinated with rounds in flight.
    pub fn install(&self, snapshot: Snapshot) {
        self.write().store.replace(snapshot);
    }

    /// Adds `id` to the view through the connector. Idempotent.
    pub fn register(&self, id: ReplicaId) {
        if id == *self.id() {
            return
        }
        let connector = &self.0.connector;
        self.0.view.write()
            .entry(id)
            .or_insert_with_key(|id| {
                info!("registered peer {}", id);
                connector.connect(id)
            });
    }

    /// Adds an existing handle to the view.
    pub fn connect_peer(&self, peer: Arc<dyn Peer>) {
        if peer.id() == self.id() {
            return
        }
        self.0.view.write().insert(peer.id().clone(), peer);
    }

    pub fn connector(&self) -> &dyn Connector {
        &*self.0.connector
    }

    /// Membership view identities, this replica included, in sorted order.
    pub fn members(&self) -> Vec<ReplicaId> {
        let mut members = self.0.view.read()
            .keys()
            .cloned()
            .chain(std::iter::once(self.id().clone()))
            .collect::<Vec<_>>();
        members.sort();
        members
    }

    /// Handles for every member, starting with this replica.
    pub fn peers(&self) -> Vec<Arc<dyn Peer>> {
        let local: Arc<dyn Peer> = Arc::new(Local(self.clone()));
        std::iter::once(local)
            .chain(self.0.view.read().values().cloned())
            .collect()
    }
}
