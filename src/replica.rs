//! # Summary
//!
//! One addressable node acting as proposer, acceptor and learner at once.
//! Client mutations become transactions driven through the proposer; peer
//! calls go straight to the acceptor and learner state in `Shared`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;
use crate::message::{Kind, Op, Reply, Request, Response, Transaction, TransactionId};
use crate::role::proposer::Proposer;
use crate::shared::Shared;

#[derive(Debug)]
pub struct Replica {
    shared: Shared,
    proposer: Proposer,

    /// Sequence number of the last transaction originated here
    seq: AtomicU64,
}

impl Replica {
    pub fn new(shared: Shared, proposer: Proposer) -> Self {
        Replica { shared, proposer, seq: AtomicU64::new(0) }
    }

    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    pub async fn put(&self, key: String, value: String) -> Response {
        self.mutate(Kind::Put, Op::Put { key, value }).await
    }

    /// Reads the local store only.
    pub fn get(&self, key: &str) -> Response {
        match self.shared.get(key) {
        | Some(value) => Response::ok(Kind::Get, Some(value)),
        | None => Response::missing(Kind::Get),
        }
    }

    pub async fn delete(&self, key: String) -> Response {
        if self.shared.get(&key).is_none() {
            return Response::missing(Kind::Delete)
        }
        self.mutate(Kind::Delete, Op::Delete { key }).await
    }

    async fn mutate(&self, kind: Kind, op: Op) -> Response {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let transaction = Transaction {
            id: TransactionId { origin: self.shared.id().clone(), seq },
            op,
        };
        match self.proposer.propose(&self.shared, transaction).await {
        | Ok(()) => Response::ok(kind, None),
        | Err(Error::Timeout { attempts }) => {
            error!("{:?} request timed out after {} attempts", kind, attempts);
            Response::timed_out(kind)
        }
        | Err(error) => {
            error!("{:?} request failed: {}", kind, error);
            Response::timed_out(kind)
        }
        }
    }

    /// Answers one request from a client or a peer.
    pub async fn respond(&self, request: Request) -> Reply {
        trace!("received {:?}", request);
        match request {
        | Request::Put { key, value } => Reply::Response(self.put(key, value).await),
        | Request::Get { key } => Reply::Response(self.get(&key)),
        | Request::Delete { key } => Reply::Response(self.delete(key).await),
        | Request::Prepare(proposal) => Reply::Prepare(self.shared.prepare(proposal)),
        | Request::Accept(proposal, value) => Reply::Accept(self.shared.accept(proposal, value)),
        | Request::Learn(accepted) => Reply::Learn(self.shared.learn(&accepted)),
        | Request::ServerId => Reply::ServerId(self.shared.id().clone()),
        | Request::Snapshot => Reply::Snapshot(self.shared.snapshot()),
        | Request::Register(id) => {
            self.shared.register(id);
            Reply::Registered
        }
        | Request::Members => Reply::Members(self.shared.members()),
        }
    }
}
