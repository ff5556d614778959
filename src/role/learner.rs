use crate::message::{Accepted, Learned, ReplicaId};
use crate::state::ReplicaState;

impl ReplicaState {
    /// Applies an agreed transaction exactly once.
    ///
    /// When the proposal came from this replica, its promise and accept
    /// scratch state is reset so its next round starts clean. Learning a
    /// peer's proposal leaves that state alone.
    pub(crate) fn learn(&mut self, me: &ReplicaId, accepted: &Accepted) -> Learned {
        if self.last_learned_proposal.as_ref() == Some(&accepted.proposal)
        || self.learned.contains(&accepted.value.id) {
            trace!("already learned {:?} at {}", accepted.value.id, accepted.proposal);
            return Learned::AlreadyLearned
        }

        debug!("learning {:?} at {}", accepted.value.op, accepted.proposal);
        self.store.apply(&accepted.value);
        self.learned.insert(accepted.value.id.clone());
        if self.last_learned_proposal.as_ref().map_or(true, |last| accepted.proposal > *last) {
            self.last_learned_proposal = Some(accepted.proposal.clone());
        }

        if accepted.proposal.replica == *me {
            self.highest_promised = None;
            self.last_accepted_proposal = None;
            self.last_accepted_value = None;
        }

        Learned::Ack
    }
}
