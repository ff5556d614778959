#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kvpaxos::{Client, Config, FaultPolicy, Phase, ProposalNumber, ReplicaId, Running};

pub const CALL_TIMEOUT: Duration = Duration::from_millis(300);

/// Short timeouts so lost rounds fail fast.
pub fn config() -> Config {
    Config::new("127.0.0.1", 0)
        .with_timeout(CALL_TIMEOUT)
        .with_retries(3)
        .with_backoff(Duration::from_millis(20))
        .with_jitter(Duration::from_millis(10))
}

pub async fn start(bootstrap: &[ReplicaId]) -> Running {
    start_with(config(), bootstrap).await
}

pub async fn start_with(config: Config, bootstrap: &[ReplicaId]) -> Running {
    config.with_bootstrap(bootstrap.to_vec())
        .run()
        .await
        .unwrap()
}

/// Starts `count` replicas, each joining through the first.
pub async fn cluster(count: usize) -> Vec<Running> {
    let first = start(&[]).await;
    let bootstrap = vec![first.id().clone()];
    let mut replicas = vec![first];
    for _ in 1..count {
        replicas.push(start(&bootstrap).await);
    }
    replicas
}

pub fn client(running: &Running) -> Client {
    Client::new(running.id().clone(), Duration::from_secs(10))
}

/// Refuses every prepare and accept.
#[derive(Debug)]
pub struct Refuse;

impl FaultPolicy for Refuse {
    fn reject(&self, _: Phase, _: &ProposalNumber) -> bool {
        true
    }
}

pub fn refusing() -> Config {
    config().with_faults(Arc::new(Refuse))
}
