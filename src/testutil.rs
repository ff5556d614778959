//! In-process replicas wired together without sockets.

use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap as Map;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::fault::{FaultPolicy, NoFaults};
use crate::message::{Accepted, Learned, Promise, ProposalNumber, ReplicaId, Transaction};
use crate::peer::{Connector, Local, Peer};
use crate::shared::Shared;
use crate::state::Snapshot;

/// Registry of live in-process replicas. Connecting to an identity that
/// is not registered yields an `Unreachable` peer.
#[derive(Clone, Default)]
pub struct Network(Arc<RwLock<Map<ReplicaId, Shared>>>);

impl Connector for Network {
    fn connect(&self, id: &ReplicaId) -> Arc<dyn Peer> {
        match self.0.read().get(id) {
        | Some(shared) => Arc::new(Local(shared.clone())),
        | None => Arc::new(Unreachable(id.clone())),
        }
    }
}

impl Network {
    pub fn spawn(&self, port: u16) -> Shared {
        self.spawn_with(port, Arc::new(NoFaults))
    }

    pub fn spawn_with(&self, port: u16, faults: Arc<dyn FaultPolicy>) -> Shared {
        let id = ReplicaId::new("127.0.0.1", port);
        let shared = Shared::new(id.clone(), faults, Arc::new(self.clone()));
        self.0.write().insert(id, shared.clone());
        shared
    }

    /// Spawns `count` replicas on consecutive ports, all knowing each other.
    pub fn cluster(&self, base: u16, count: usize) -> Vec<Shared> {
        self.cluster_with(base, count, |_| -> Arc<dyn FaultPolicy> { Arc::new(NoFaults) })
    }

    pub fn cluster_with<F>(&self, base: u16, count: usize, faults: F) -> Vec<Shared>
        where F: Fn(usize) -> Arc<dyn FaultPolicy>
    {
        let nodes = (0..count)
            .map(|index| self.spawn_with(base + index as u16, faults(index)))
            .collect::<Vec<_>>();
        for node in &nodes {
            for other in &nodes {
                node.register(other.id().clone());
            }
        }
        nodes
    }
}

/// A replica that cannot be reached.
#[derive(Debug)]
pub struct Unreachable(pub ReplicaId);

#[async_trait]
impl Peer for Unreachable {
    fn id(&self) -> &ReplicaId { &self.0 }
    async fn prepare(&self, _: ProposalNumber) -> Result<Promise> { Err(Error::Disconnected) }
    async fn accept(&self, _: ProposalNumber, _: Transaction) -> Result<Accepted> { Err(Error::Disconnected) }
    async fn learn(&self, _: Accepted) -> Result<Learned> { Err(Error::Disconnected) }
    async fn server_id(&self) -> Result<ReplicaId> { Err(Error::Disconnected) }
    async fn snapshot(&self) -> Result<Snapshot> { Err(Error::Disconnected) }
    async fn register(&self, _: ReplicaId) -> Result<()> { Err(Error::Disconnected) }
    async fn members(&self) -> Result<Vec<ReplicaId>> { Err(Error::Disconnected) }
}
