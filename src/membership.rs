//! # Summary
//!
//! Startup join protocol. A new replica walks its bootstrap list in order,
//! asks the first reachable candidate for its member list, copies a
//! snapshot from each member and registers itself with them. If nobody
//! answers, the replica runs as a cluster of one.
//!
//! Only the candidate's own view is joined; members the candidate does not
//! know about are never contacted.

use crate::message::ReplicaId;
use crate::shared::Shared;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Joined {
    /// Contacted members through this candidate
    Cluster {
        via: ReplicaId,
        members: Vec<ReplicaId>,
    },

    /// No candidate answered
    Standalone,
}

/// Runs the join protocol against `bootstrap`. Never fails: every error is
/// logged and the next candidate is tried.
pub async fn join(shared: &Shared, bootstrap: &[ReplicaId]) -> Joined {
    for candidate in bootstrap.iter().filter(|candidate| *candidate != shared.id()) {
        let handle = shared.connector().connect(candidate);
        let members = match handle.members().await {
        | Ok(members) => members,
        | Err(error) => {
            warn!("join through {} failed: {}", candidate, error);
            continue
        }
        };

        let mut contacted = Vec::new();
        for member in members.into_iter().filter(|member| member != shared.id()) {
            let peer = shared.connector().connect(&member);
            // Each snapshot overwrites the last, so the store ends up as a
            // copy of the final member reached. Rounds already in flight are
            // not reconciled with it. Learned transaction ids are not copied
            // either, so the first round proposed here may recover and
            // re-apply the latest value the snapshot already holds.
            match peer.snapshot().await {
            | Ok(snapshot) => {
                debug!("copied {} keys from {}", snapshot.len(), member);
                shared.install(snapshot);
            }
            | Err(error) => {
                warn!("snapshot from {} failed: {}", member, error);
                continue
            }
            }
            if let Err(error) = peer.register(shared.id().clone()).await {
                warn!("registering with {} failed: {}", member, error);
                continue
            }
            shared.connect_peer(peer);
            contacted.push(member);
        }

        if !contacted.is_empty() {
            info!("joined {} members through {}", contacted.len(), candidate);
            return Joined::Cluster { via: candidate.clone(), members: contacted }
        }
        warn!("no member reachable through {}", candidate);
    }
    info!("no bootstrap replica reachable, running standalone");
    Joined::Standalone
}
