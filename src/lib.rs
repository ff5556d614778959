#[macro_use] extern crate derivative;
#[macro_use] extern crate log;

mod client;
mod clock;
mod config;
mod error;
mod fault;
mod membership;
mod message;
mod peer;
mod replica;
mod role;
mod server;
mod shared;
mod socket;
mod state;

#[cfg(test)]
mod testutil;

pub use crate::client::Client;
pub use crate::clock::ProposalClock;
pub use crate::config::{Config, Running, DEFAULT_HOST};
pub use crate::error::{Error, Result};
pub use crate::fault::{FaultPolicy, NoFaults, Phase};
#[cfg(feature = "fault-injection")]
pub use crate::fault::{RejectAll, RejectDivisible};
pub use crate::membership::{join, Joined};
pub use crate::message::{
    Accepted, Kind, Learned, Op, Promise, ProposalNumber, Rejected, ReplicaId, Reply, Request,
    Response, Transaction, TransactionId, KEY_NOT_FOUND, OK, TIMED_OUT,
};
pub use crate::peer::{Connector, Peer, Remote, TcpConnector};
pub use crate::replica::Replica;
pub use crate::role::proposer::{quorum, Proposer};
pub use crate::shared::Shared;
pub use crate::state::{ReplicaState, Snapshot, Store};
