//! # Summary
//!
//! Request/reply calls over TCP. Every call opens a fresh connection, sends
//! one `Request`, and waits for one `Reply`, all within a single deadline.
//! Replicas use this to reach their peers; `Client` exposes the
//! client-facing subset.

use std::time::Duration;

use futures::{SinkExt, TryStreamExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::message::{ReplicaId, Reply, Request, Response};
use crate::socket;

/// Sends `request` to `id` and returns its reply, or fails once `timeout`
/// has passed.
pub(crate) async fn call(id: &ReplicaId, request: Request, timeout: Duration) -> Result<Reply> {
    let exchange = async {
        let stream = TcpStream::connect((id.host(), id.port())).await?;
        stream.set_nodelay(true)?;
        let mut socket = socket::new::<Reply, Request>(stream);
        socket.send(request).await?;
        socket.try_next().await?.ok_or(Error::Disconnected)
    };
    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| Error::CallTimeout)?
}

/// Issues put/get/delete against one replica.
#[derive(Clone, Debug)]
pub struct Client {
    replica: ReplicaId,
    timeout: Duration,
}

impl Client {
    /// The timeout must cover every attempt the replica makes before it
    /// gives up, including backoff, or a lost request surfaces as
    /// `Error::CallTimeout` instead of a `request timed out` response.
    /// `Proposer::worst_case` gives that bound for a replica's settings.
    pub fn new(replica: ReplicaId, timeout: Duration) -> Self {
        Client { replica, timeout }
    }

    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    pub async fn put<K: Into<String>, V: Into<String>>(&self, key: K, value: V) -> Result<Response> {
        self.request(Request::Put { key: key.into(), value: value.into() }).await
    }

    pub async fn get<K: Into<String>>(&self, key: K) -> Result<Response> {
        self.request(Request::Get { key: key.into() }).await
    }

    pub async fn delete<K: Into<String>>(&self, key: K) -> Result<Response> {
        self.request(Request::Delete { key: key.into() }).await
    }

    async fn request(&self, request: Request) -> Result<Response> {
        match call(&self.replica, request, self.timeout).await? {
        | Reply::Response(response) => Ok(response),
        | other => Err(Error::UnexpectedReply(Box::new(other))),
        }
    }
}
