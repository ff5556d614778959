//! # Summary
//!
//! The proposer runs one full Paxos instance per client mutation:
//!
//! 1. `prepare` a fresh proposal number at every member, self included
//! 2. on a majority of promises, pick the value: the highest previously
//!    accepted one this replica has not learned yet, else our own
//! 3. `accept` it at every replica that promised
//! 4. on a majority of accepts, `learn` it at every replica that accepted,
//!    and at the members that did not so all reachable stores converge
//!
//! Calls fan out concurrently and each one has its own deadline. Any failed,
//! refused or late call is a denied vote. A phase short of a majority backs
//! off and tries again with a higher number, up to `retries` attempts.
//!
//! Giving up does not withdraw the value. An acceptor that took it in a
//! lost round still reports it in later promises, so another proposer can
//! carry it forward and get it chosen after the caller saw a timeout.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;

use crate::error::{Error, Result};
use crate::message::{Accepted, Promise, ProposalNumber, Transaction};
use crate::peer::Peer;
use crate::shared::Shared;

/// Votes needed out of `total` members.
pub fn quorum(total: usize) -> usize {
    total / 2 + 1
}

/// Retry and timing policy for rounds started by this replica.
#[derive(Copy, Clone, Debug)]
pub struct Proposer {
    /// Attempts before giving up with a timeout
    pub retries: usize,

    /// Deadline for each individual peer call
    pub timeout: Duration,

    /// Fixed pause after a phase misses its quorum
    pub backoff: Duration,

    /// Upper bound of random delay added to `backoff`
    pub jitter: Duration,
}

impl Default for Proposer {
    fn default() -> Self {
        Proposer {
            retries: 3,
            timeout: Duration::from_secs(1),
            backoff: Duration::from_secs(2),
            jitter: Duration::from_millis(250),
        }
    }
}

#[derive(Debug)]
enum Round {
    /// A majority accepted this value and learners were told
    Committed(Transaction),

    /// Not enough votes in the named phase
    NoQuorum {
        phase: &'static str,
        votes: usize,
        needed: usize,
    },
}

impl Proposer {
    /// Drives `transaction` to agreement, or fails with `Error::Timeout`
    /// after `retries` attempts.
    pub async fn propose(&self, shared: &Shared, transaction: Transaction) -> Result<()> {
        for attempt in 1..=self.retries {
            if shared.has_learned(&transaction.id) {
                return Ok(())
            }
            let peers = shared.peers();
            let proposal = shared.clock().tick();
            debug!("attempt {} of {:?} as {} across {} members", attempt, transaction.id, proposal, peers.len());
            match self.round(shared, &peers, proposal, &transaction).await {
            | Round::Committed(value) if value.id == transaction.id => {
                info!("committed {:?} on attempt {}", transaction.op, attempt);
                return Ok(())
            }
            | Round::Committed(value) => {
                info!("attempt {} recovered earlier value {:?}, proposing again", attempt, value.id);
            }
            | Round::NoQuorum { phase, votes, needed } => {
                warn!("attempt {} lost {} with {}/{} votes", attempt, phase, votes, needed);
                if attempt < self.retries {
                    tokio::time::sleep(self.pause()).await;
                }
            }
            }
        }
        // Another proposer may have recovered it during the last attempt.
        if shared.has_learned(&transaction.id) {
            info!("{:?} was committed by another proposer", transaction.id);
            return Ok(())
        }
        warn!("giving up on {:?} after {} attempts", transaction.id, self.retries);
        Err(Error::Timeout { attempts: self.retries })
    }

    /// Longest time `propose` can take: every call of the three phases
    /// runs into its deadline on every attempt, with the longest pause in
    /// between.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.retries as u32;
        let pauses = attempts.saturating_sub(1);
        self.timeout * 3 * attempts + (self.backoff + self.jitter) * pauses
    }

    async fn round(&self, shared: &Shared, peers: &[Arc<dyn Peer>], proposal: ProposalNumber, own: &Transaction) -> Round {
        let needed = quorum(peers.len());

        let promised = self.gather(shared, peers, |peer| peer.prepare(proposal.clone())).await;
        if promised.len() < needed {
            return Round::NoQuorum { phase: "prepare", votes: promised.len(), needed }
        }

        let promises = promised.iter().map(|(_, promise)| promise);
        let value = Self::select(shared, promises).unwrap_or_else(|| own.clone());
        let voters = promised.into_iter().map(|(peer, _)| peer).collect::<Vec<_>>();

        let accepted = self.gather(shared, &voters, |peer| peer.accept(proposal.clone(), value.clone())).await;
        if accepted.len() < needed {
            return Round::NoQuorum { phase: "accept", votes: accepted.len(), needed }
        }

        // Members that did not accept, this replica possibly among them, are
        // told by the proposer itself.
        let lessons = peers.iter()
            .map(|peer| {
                let record = accepted.iter()
                    .find(|(voter, _)| voter.id() == peer.id())
                    .map(|(_, record)| record.clone())
                    .unwrap_or_else(|| Accepted {
                        from: shared.id().clone(),
                        proposal: proposal.clone(),
                        value: value.clone(),
                    });
                (peer.clone(), record)
            })
            .collect();
        self.teach(lessons).await;
        Round::Committed(value)
    }

    /// Safety rule: a value some earlier round may have gotten accepted
    /// by a majority must be carried forward instead of our own.
    fn select<'a, I>(shared: &Shared, promises: I) -> Option<Transaction>
        where I: IntoIterator<Item = &'a Promise>
    {
        promises.into_iter()
            .filter_map(|promise| promise.previous.as_ref())
            .filter(|(_, value)| !shared.has_learned(&value.id))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, value)| value.clone())
    }

    /// Calls every peer concurrently, keeping the ones that answered.
    async fn gather<'a, T, F, Fut>(&self, shared: &Shared, peers: &'a [Arc<dyn Peer>], call: F) -> Vec<(Arc<dyn Peer>, T)>
        where F: Fn(&'a Arc<dyn Peer>) -> Fut,
              Fut: std::future::Future<Output = Result<T>>,
    {
        let calls = peers.iter().map(|peer| {
            let reply = tokio::time::timeout(self.timeout, call(peer));
            async move { (peer, reply.await) }
        });
        join_all(calls).await
            .into_iter()
            .filter_map(|(peer, reply)| match reply {
            | Ok(Ok(vote)) => Some((peer.clone(), vote)),
            | Ok(Err(Error::Rejected { promised })) => {
                debug!("{} denied vote, promised {:?}", peer.id(), promised);
                if let Some(promised) = promised {
                    shared.clock().observe(&promised);
                }
                None
            }
            | Ok(Err(error)) => {
                debug!("{} denied vote: {}", peer.id(), error);
                None
            }
            | Err(_) => {
                debug!("{} denied vote: no reply within {:?}", peer.id(), self.timeout);
                None
            }
            })
            .collect()
    }

    /// Best effort: the value is already chosen, so failures are only logged.
    async fn teach(&self, lessons: Vec<(Arc<dyn Peer>, Accepted)>) {
        let calls = lessons.into_iter().map(|(peer, record)| async move {
            let learned = tokio::time::timeout(self.timeout, peer.learn(record)).await;
            (peer, learned)
        });
        for (peer, learned) in join_all(calls).await {
            match learned {
            | Ok(Ok(learned)) => trace!("{} answered learn with {:?}", peer.id(), learned),
            | Ok(Err(error)) => warn!("{} failed to learn: {}", peer.id(), error),
            | Err(_) => warn!("{} failed to learn: no reply within {:?}", peer.id(), self.timeout),
            }
        }
    }

    fn pause(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.backoff
        }
        let extra = rand::thread_rng().gen_range(Duration::ZERO..=self.jitter);
        self.backoff + extra
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fault::{FaultPolicy, NoFaults, Phase, RejectAll, RejectDivisible};
    use crate::message::{Learned, Op, ReplicaId, TransactionId};
    use crate::state::Snapshot;
    use crate::testutil;

    fn fast() -> Proposer {
        Proposer {
            retries: 3,
            timeout: Duration::from_millis(200),
            backoff: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    fn put(origin: &Shared, seq: u64, key: &str, value: &str) -> Transaction {
        Transaction {
            id: TransactionId { origin: origin.id().clone(), seq },
            op: Op::Put { key: key.into(), value: value.into() },
        }
    }

    /// Never answers prepare.
    #[derive(Debug)]
    struct Silent(ReplicaId);

    #[async_trait]
    impl Peer for Silent {
        fn id(&self) -> &ReplicaId { &self.0 }
        async fn prepare(&self, _: ProposalNumber) -> Result<Promise> { futures::future::pending().await }
        async fn accept(&self, _: ProposalNumber, _: Transaction) -> Result<Accepted> { futures::future::pending().await }
        async fn learn(&self, _: Accepted) -> Result<Learned> { futures::future::pending().await }
        async fn server_id(&self) -> Result<ReplicaId> { Ok(self.0.clone()) }
        async fn snapshot(&self) -> Result<Snapshot> { Ok(Snapshot::default()) }
        async fn register(&self, _: ReplicaId) -> Result<()> { Ok(()) }
        async fn members(&self) -> Result<Vec<ReplicaId>> { Ok(vec![self.0.clone()]) }
    }

    /// Rejects everything and counts prepares.
    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl FaultPolicy for Counting {
        fn reject(&self, phase: Phase, _: &ProposalNumber) -> bool {
            if phase == Phase::Prepare {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            true
        }
    }

    /// Learns `record` on `target` when asked to prepare, as if another
    /// proposer recovered it meanwhile, then fails the call.
    #[derive(Debug)]
    struct Recovering {
        id: ReplicaId,
        target: Shared,
        record: Accepted,
    }

    #[async_trait]
    impl Peer for Recovering {
        fn id(&self) -> &ReplicaId { &self.id }
        async fn prepare(&self, _: ProposalNumber) -> Result<Promise> {
            self.target.learn(&self.record);
            Err(Error::Disconnected)
        }
        async fn accept(&self, _: ProposalNumber, _: Transaction) -> Result<Accepted> { Err(Error::Disconnected) }
        async fn learn(&self, _: Accepted) -> Result<Learned> { Err(Error::Disconnected) }
        async fn server_id(&self) -> Result<ReplicaId> { Ok(self.id.clone()) }
        async fn snapshot(&self) -> Result<Snapshot> { Err(Error::Disconnected) }
        async fn register(&self, _: ReplicaId) -> Result<()> { Err(Error::Disconnected) }
        async fn members(&self) -> Result<Vec<ReplicaId>> { Err(Error::Disconnected) }
    }

    /// Rejects only accepts.
    struct RefuseAccepts;

    impl FaultPolicy for RefuseAccepts {
        fn reject(&self, phase: Phase, _: &ProposalNumber) -> bool {
            phase == Phase::Accept
        }
    }

    /// Rejects everything while on.
    #[derive(Default)]
    struct Switch(AtomicBool);

    impl FaultPolicy for Switch {
        fn reject(&self, _: Phase, _: &ProposalNumber) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn worst_case_covers_every_deadline_and_pause() {
        assert_eq!(Proposer::default().worst_case(), Duration::from_millis(13_500));
        let single = Proposer { retries: 1, ..Proposer::default() };
        assert_eq!(single.worst_case(), Duration::from_secs(3));
    }

    #[test]
    fn quorum_is_a_strict_majority() {
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(2), 2);
        assert_eq!(quorum(3), 2);
        assert_eq!(quorum(4), 3);
        assert_eq!(quorum(5), 3);
        assert_eq!(quorum(6), 4);
    }

    #[tokio::test]
    async fn standalone_replica_commits_alone() {
        let network = testutil::Network::default();
        let node = network.spawn(7100);
        fast().propose(&node, put(&node, 1, "k", "v")).await.unwrap();
        assert_eq!(node.get("k"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn every_replica_learns_a_committed_put() {
        let network = testutil::Network::default();
        let nodes = network.cluster(7110, 3);
        fast().propose(&nodes[1], put(&nodes[1], 1, "k", "v")).await.unwrap();
        for node in &nodes {
            assert_eq!(node.get("k"), Some("v".to_string()));
        }
    }

    #[tokio::test]
    async fn three_of_five_votes_are_enough() {
        let network = testutil::Network::default();
        let nodes = network.cluster(7120, 3);
        nodes[0].connect_peer(Arc::new(testutil::Unreachable(ReplicaId::new("127.0.0.1", 7128))));
        nodes[0].connect_peer(Arc::new(testutil::Unreachable(ReplicaId::new("127.0.0.1", 7129))));
        assert_eq!(nodes[0].peers().len(), 5);
        fast().propose(&nodes[0], put(&nodes[0], 1, "k", "v")).await.unwrap();
        assert_eq!(nodes[2].get("k"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn two_of_five_votes_time_out() {
        let network = testutil::Network::default();
        let nodes = network.cluster(7130, 2);
        for port in 7137..7140 {
            nodes[0].connect_peer(Arc::new(testutil::Unreachable(ReplicaId::new("127.0.0.1", port))));
        }
        let result = fast().propose(&nodes[0], put(&nodes[0], 1, "k", "v")).await;
        assert!(matches!(result, Err(Error::Timeout { attempts: 3 })));
        assert_eq!(nodes[0].get("k"), None);
        assert_eq!(nodes[1].get("k"), None);
    }

    #[tokio::test]
    async fn silent_peer_counts_as_denial() {
        let network = testutil::Network::default();
        let nodes = network.cluster(7140, 2);
        nodes[0].connect_peer(Arc::new(Silent(ReplicaId::new("127.0.0.1", 7149))));
        fast().propose(&nodes[0], put(&nodes[0], 1, "k", "v")).await.unwrap();
        assert_eq!(nodes[1].get("k"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn retries_stop_after_the_configured_attempts() {
        let network = testutil::Network::default();
        let counter = Arc::new(Counting::default());
        let node = network.spawn_with(7150, counter.clone());
        let proposer = Proposer { retries: 4, ..fast() };
        let result = proposer.propose(&node, put(&node, 1, "k", "v")).await;
        assert!(matches!(result, Err(Error::Timeout { attempts: 4 })));
        assert_eq!(counter.0.load(Ordering::SeqCst), 4);
        assert!(node.snapshot().is_empty());
    }

    #[tokio::test]
    async fn minority_fault_does_not_block_progress() {
        let network = testutil::Network::default();
        let nodes = network.cluster_with(7160, 5, |index| -> Arc<dyn FaultPolicy> {
            if index == 3 {
                Arc::new(RejectDivisible { divisor: 1 })
            } else {
                Arc::new(NoFaults)
            }
        });
        for (seq, node) in nodes.iter().enumerate() {
            let value = format!("v{}", seq);
            fast().propose(node, put(node, seq as u64, "k", &value)).await.unwrap();
        }
        let agreeing = nodes.iter()
            .filter(|node| node.get("k") == Some("v4".to_string()))
            .count();
        assert!(agreeing >= 3);
    }

    #[tokio::test]
    async fn members_that_refused_the_accept_still_learn() {
        let network = testutil::Network::default();
        let nodes = network.cluster_with(7520, 3, |index| -> Arc<dyn FaultPolicy> {
            if index == 2 { Arc::new(RefuseAccepts) } else { Arc::new(NoFaults) }
        });
        fast().propose(&nodes[0], put(&nodes[0], 1, "k", "v")).await.unwrap();
        for node in &nodes {
            assert_eq!(node.get("k"), Some("v".to_string()));
        }
    }

    #[tokio::test]
    async fn majority_fault_exhausts_retries() {
        let network = testutil::Network::default();
        let nodes = network.cluster_with(7170, 3, |index| -> Arc<dyn FaultPolicy> {
            if index == 0 {
                Arc::new(NoFaults)
            } else {
                Arc::new(RejectAll)
            }
        });
        let result = fast().propose(&nodes[0], put(&nodes[0], 1, "k", "v")).await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn previously_accepted_value_is_carried_forward() {
        let network = testutil::Network::default();
        let nodes = network.cluster(7180, 3);

        // An earlier proposer from node 2 got its value accepted by a
        // majority, then vanished before anyone learned it.
        let orphan = put(&nodes[2], 1, "k", "orphan");
        let earlier = nodes[2].clock().tick();
        for node in &nodes[..2] {
            node.prepare(earlier.clone()).unwrap();
            node.accept(earlier.clone(), orphan.clone()).unwrap();
        }

        fast().propose(&nodes[0], put(&nodes[0], 1, "k", "mine")).await.unwrap();

        for node in &nodes[..2] {
            assert!(node.has_learned(&orphan.id));
            assert_eq!(node.get("k"), Some("mine".to_string()));
        }
    }

    #[tokio::test]
    async fn learned_values_are_not_resurrected() {
        let network = testutil::Network::default();
        let nodes = network.cluster(7190, 3);
        fast().propose(&nodes[1], put(&nodes[1], 1, "k", "first")).await.unwrap();
        fast().propose(&nodes[1], put(&nodes[1], 2, "k", "second")).await.unwrap();
        fast().propose(&nodes[0], put(&nodes[0], 1, "other", "x")).await.unwrap();
        for node in &nodes {
            assert_eq!(node.get("k"), Some("second".to_string()));
            assert_eq!(node.get("other"), Some("x".to_string()));
        }
    }

    #[tokio::test]
    async fn value_committed_elsewhere_during_last_attempt_is_success() {
        let network = testutil::Network::default();
        let node = network.spawn_with(7195, Arc::new(RejectAll));
        let transaction = put(&node, 1, "k", "v");
        let other = ReplicaId::new("127.0.0.1", 7196);
        node.connect_peer(Arc::new(Recovering {
            id: other.clone(),
            target: node.clone(),
            record: Accepted {
                from: other.clone(),
                proposal: ProposalNumber { round: 50, replica: other },
                value: transaction.clone(),
            },
        }));

        let proposer = Proposer { retries: 1, ..fast() };
        proposer.propose(&node, transaction).await.unwrap();
        assert_eq!(node.get("k"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn timed_out_value_can_still_be_chosen_later() {
        let network = testutil::Network::default();
        let switch = Arc::new(Switch(AtomicBool::new(true)));
        let nodes = network.cluster_with(7500, 3, |index| -> Arc<dyn FaultPolicy> {
            match index {
            | 0 => Arc::new(RefuseAccepts),
            | 1 => Arc::new(NoFaults),
            | _ => switch.clone(),
            }
        });

        // Only node 1 accepts, so every attempt misses the accept quorum.
        let lost = put(&nodes[0], 1, "k", "lost");
        let result = fast().propose(&nodes[0], lost.clone()).await;
        assert!(matches!(result, Err(Error::Timeout { attempts: 3 })));
        assert!(nodes.iter().all(|node| node.get("k").is_none()));

        // Node 1 still reports the value in its promises and the next
        // proposer carries it forward before its own.
        switch.0.store(false, Ordering::SeqCst);
        fast().propose(&nodes[1], put(&nodes[1], 1, "other", "x")).await.unwrap();
        for node in &nodes {
            assert!(node.has_learned(&lost.id));
            assert_eq!(node.get("k"), Some("lost".to_string()));
            assert_eq!(node.get("other"), Some("x".to_string()));
        }
    }
}
