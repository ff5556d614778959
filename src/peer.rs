//! # Summary
//!
//! Handles to other replicas. A `Peer` exposes the acceptor, learner and
//! membership calls of one replica, whether it lives in this process
//! (`Local`) or behind a socket (`Remote`). A `Connector` turns an identity
//! into a handle, which is how a registering replica becomes reachable.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::client;
use crate::error::{Error, Result};
use crate::message::{Accepted, Learned, Promise, ProposalNumber, ReplicaId, Reply, Request, Transaction};
use crate::shared::Shared;
use crate::state::Snapshot;

#[async_trait]
pub trait Peer: Send + Sync + fmt::Debug {
    fn id(&self) -> &ReplicaId;

    async fn prepare(&self, proposal: ProposalNumber) -> Result<Promise>;

    async fn accept(&self, proposal: ProposalNumber, value: Transaction) -> Result<Accepted>;

    async fn learn(&self, accepted: Accepted) -> Result<Learned>;

    async fn server_id(&self) -> Result<ReplicaId>;

    async fn snapshot(&self) -> Result<Snapshot>;

    /// Asks the peer to add `id` to its membership view.
    async fn register(&self, id: ReplicaId) -> Result<()>;

    /// Identities in the peer's membership view, itself included.
    async fn members(&self) -> Result<Vec<ReplicaId>>;
}

pub trait Connector: Send + Sync {
    fn connect(&self, id: &ReplicaId) -> Arc<dyn Peer>;
}

/// The replica itself, reached without the network.
#[derive(Clone)]
pub struct Local(pub(crate) Shared);

impl fmt::Debug for Local {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Local").field(self.0.id()).finish()
    }
}

#[async_trait]
impl Peer for Local {
    fn id(&self) -> &ReplicaId {
        self.0.id()
    }

    async fn prepare(&self, proposal: ProposalNumber) -> Result<Promise> {
        self.0.prepare(proposal)
            .map_err(|rejected| Error::Rejected { promised: rejected.promised })
    }

    async fn accept(&self, proposal: ProposalNumber, value: Transaction) -> Result<Accepted> {
        self.0.accept(proposal, value)
            .map_err(|rejected| Error::Rejected { promised: rejected.promised })
    }

    async fn learn(&self, accepted: Accepted) -> Result<Learned> {
        Ok(self.0.learn(&accepted))
    }

    async fn server_id(&self) -> Result<ReplicaId> {
        Ok(self.0.id().clone())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.0.snapshot())
    }

    async fn register(&self, id: ReplicaId) -> Result<()> {
        self.0.register(id);
        Ok(())
    }

    async fn members(&self) -> Result<Vec<ReplicaId>> {
        Ok(self.0.members())
    }
}

/// A replica in another process, one TCP call per operation.
#[derive(Clone, Debug)]
pub struct Remote {
    id: ReplicaId,
    timeout: Duration,
}

impl Remote {
    pub fn new(id: ReplicaId, timeout: Duration) -> Self {
        Remote { id, timeout }
    }

    async fn call(&self, request: Request) -> Result<Reply> {
        client::call(&self.id, request, self.timeout).await
    }
}

fn unexpected<T>(reply: Reply) -> Result<T> {
    Err(Error::UnexpectedReply(Box::new(reply)))
}

#[async_trait]
impl Peer for Remote {
    fn id(&self) -> &ReplicaId {
        &self.id
    }

    async fn prepare(&self, proposal: ProposalNumber) -> Result<Promise> {
        match self.call(Request::Prepare(proposal)).await? {
        | Reply::Prepare(Ok(promise)) => Ok(promise),
        | Reply::Prepare(Err(rejected)) => Err(Error::Rejected { promised: rejected.promised }),
        | other => unexpected(other),
        }
    }

    async fn accept(&self, proposal: ProposalNumber, value: Transaction) -> Result<Accepted> {
        match self.call(Request::Accept(proposal, value)).await? {
        | Reply::Accept(Ok(accepted)) => Ok(accepted),
        | Reply::Accept(Err(rejected)) => Err(Error::Rejected { promised: rejected.promised }),
        | other => unexpected(other),
        }
    }

    async fn learn(&self, accepted: Accepted) -> Result<Learned> {
        match self.call(Request::Learn(accepted)).await? {
        | Reply::Learn(learned) => Ok(learned),
        | other => unexpected(other),
        }
    }

    async fn server_id(&self) -> Result<ReplicaId> {
        match self.call(Request::ServerId).await? {
        | Reply::ServerId(id) => Ok(id),
        | other => unexpected(other),
        }
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        match self.call(Request::Snapshot).await? {
        | Reply::Snapshot(snapshot) => Ok(snapshot),
        | other => unexpected(other),
        }
    }

    async fn register(&self, id: ReplicaId) -> Result<()> {
        match self.call(Request::Register(id)).await? {
        | Reply::Registered => Ok(()),
        | other => unexpected(other),
        }
    }

    async fn members(&self) -> Result<Vec<ReplicaId>> {
        match self.call(Request::Members).await? {
        | Reply::Members(members) => Ok(members),
        | other => unexpected(other),
        }
    }
}

/// Connects to replicas over TCP.
#[derive(Copy, Clone, Debug)]
pub struct TcpConnector {
    pub timeout: Duration,
}

impl Connector for TcpConnector {
    fn connect(&self, id: &ReplicaId) -> Arc<dyn Peer> {
        Arc::new(Remote::new(id.clone(), self.timeout))
    }
}
