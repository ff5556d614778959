use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::fault::{FaultPolicy, NoFaults};
use crate::membership;
use crate::message::ReplicaId;
use crate::peer::TcpConnector;
use crate::replica::Replica;
use crate::role::proposer::Proposer;
use crate::server;
use crate::shared::Shared;

pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Derivative)]
#[derivative(Debug)]
#[derive(Clone)]
pub struct Config {
    /// Interface to listen on
    host: String,

    /// Port to listen on, or 0 for any free port
    port: u16,

    /// Replicas to try, in order, when joining a cluster
    bootstrap: Vec<ReplicaId>,

    /// Retry and timing policy for proposals
    proposer: Proposer,

    #[derivative(Debug = "ignore")]
    faults: Arc<dyn FaultPolicy>,
}

impl Config {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Self {
        Config {
            host: host.into(),
            port,
            bootstrap: Vec::new(),
            proposer: Proposer::default(),
            faults: Arc::new(NoFaults),
        }
    }

    pub fn with_bootstrap(mut self, bootstrap: Vec<ReplicaId>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Deadline for each call to a peer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.proposer.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.proposer.retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.proposer.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.proposer.jitter = jitter;
        self
    }

    pub fn with_faults(mut self, faults: Arc<dyn FaultPolicy>) -> Self {
        self.faults = faults;
        self
    }

    /// Binds the listener, joins the cluster and starts serving in the
    /// background. The replica's identity is the bound `host:port`.
    pub async fn run(self) -> Result<Running> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let id = ReplicaId::new(self.host, listener.local_addr()?.port());
        info!("listening as {}", id);

        let connector = TcpConnector { timeout: self.proposer.timeout };
        let shared = Shared::new(id, self.faults, Arc::new(connector));
        membership::join(&shared, &self.bootstrap).await;

        let replica = Arc::new(Replica::new(shared, self.proposer));
        let server = tokio::spawn(server::serve(listener, replica.clone()));
        Ok(Running { replica, server })
    }
}

/// A serving replica. Dropping the handle stops the accept loop.
#[derive(Debug)]
pub struct Running {
    replica: Arc<Replica>,
    server: JoinHandle<()>,
}

impl Running {
    pub fn id(&self) -> &ReplicaId {
        self.replica.shared().id()
    }

    pub fn replica(&self) -> &Arc<Replica> {
        &self.replica
    }

    /// Stops accepting connections. Requests already being served run to
    /// completion.
    pub fn shutdown(&self) {
        self.server.abort();
    }

    /// Waits until the accept loop exits.
    pub async fn wait(mut self) {
        if let Err(error) = (&mut self.server).await {
            if !error.is_cancelled() {
                error!("server task failed: {}", error);
            }
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.server.abort();
    }
}
