//! # Summary
//!
//! Wire-level data shared by every role: replica identities, proposal
//! numbers, transactions, and the request/reply pairs exchanged between
//! replicas and clients.

use std::fmt;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::state::Snapshot;

/// Replica identity, derived from the listening host and port.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplicaId {
    host: String,
    port: u16,
}

impl ReplicaId {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Self {
        ReplicaId { host: host.into(), port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Parses a comma-separated list of `host:port` endpoints.
    /// Blank entries are skipped.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, Error> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ReplicaId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Endpoint(s.to_string());
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid())
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(ReplicaId::new(host, port))
    }
}

/// Totally ordered round tag. Rounds are compared first, then the
/// proposing replica, so two replicas never produce equal numbers.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalNumber {
    pub round: u64,
    pub replica: ReplicaId,
}

impl fmt::Display for ProposalNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.round, self.replica)
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId {
    pub origin: ReplicaId,
    pub seq: u64,
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Put { key: String, value: String },
    Delete { key: String },
}

/// Unit of agreement. Never modified after creation.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub op: Op,
}

impl Transaction {
    pub fn key(&self) -> &str {
        match &self.op {
        | Op::Put { key, .. } | Op::Delete { key } => key,
        }
    }
}

/// Acceptor's answer to `prepare`.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promise {
    pub from: ReplicaId,
    pub proposal: ProposalNumber,
    pub previous: Option<(ProposalNumber, Transaction)>,
}

/// Acceptor's answer to `accept`, and the record handed to learners.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    pub from: ReplicaId,
    pub proposal: ProposalNumber,
    pub value: Transaction,
}

/// Refusal from an acceptor, carrying the proposal it has promised.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejected {
    pub from: ReplicaId,
    pub promised: Option<ProposalNumber>,
}

#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Learned {
    Ack,
    AlreadyLearned,
}

#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Put,
    Get,
    Delete,
}

pub const OK: &str = "ok";
pub const KEY_NOT_FOUND: &str = "key not found";
pub const TIMED_OUT: &str = "request timed out";

/// Client-facing result. Every client operation produces one of these.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub kind: Kind,
    pub value: Option<String>,
    pub message: String,
}

impl Response {
    pub fn ok(kind: Kind, value: Option<String>) -> Self {
        Response { kind, value, message: OK.to_string() }
    }

    pub fn missing(kind: Kind) -> Self {
        Response { kind, value: None, message: KEY_NOT_FOUND.to_string() }
    }

    pub fn timed_out(kind: Kind) -> Self {
        Response { kind, value: None, message: TIMED_OUT.to_string() }
    }

    pub fn is_ok(&self) -> bool {
        self.message == OK
    }
}

/// Everything a replica can be asked over the network.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug)]
pub enum Request {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Prepare(ProposalNumber),
    Accept(ProposalNumber, Transaction),
    Learn(Accepted),
    ServerId,
    Snapshot,
    Register(ReplicaId),
    Members,
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug)]
pub enum Reply {
    Response(Response),
    Prepare(Result<Promise, Rejected>),
    Accept(Result<Accepted, Rejected>),
    Learn(Learned),
    ServerId(ReplicaId),
    Snapshot(Snapshot),
    Registered,
    Members(Vec<ReplicaId>),
}
