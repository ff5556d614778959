//! # Summary
//!
//! Acceptors act as Paxos's distributed memory: they remember the highest
//! proposal they promised and the last value they accepted, and refuse
//! anything older.

use crate::message::{Accepted, Promise, ProposalNumber, Rejected, ReplicaId, Transaction};
use crate::state::ReplicaState;

impl ReplicaState {
    /// Promises not to accept anything below `proposal`, reporting the
    /// last accepted value so the proposer can carry it forward.
    pub(crate) fn prepare(&mut self, me: &ReplicaId, proposal: ProposalNumber) -> Result<Promise, Rejected> {
        if let Some(promised) = &self.highest_promised {
            if proposal <= *promised {
                trace!("refusing prepare {}, promised {}", proposal, promised);
                return Err(self.rejected(me))
            }
        }
        self.highest_promised = Some(proposal.clone());
        let previous = self.last_accepted_proposal.clone()
            .zip(self.last_accepted_value.clone());
        Ok(Promise {
            from: me.clone(),
            proposal,
            previous,
        })
    }

    /// Records `value` unless a higher proposal has been promised.
    pub(crate) fn accept(&mut self, me: &ReplicaId, proposal: ProposalNumber, value: Transaction) -> Result<Accepted, Rejected> {
        if let Some(promised) = &self.highest_promised {
            if proposal < *promised {
                trace!("refusing accept {}, promised {}", proposal, promised);
                return Err(self.rejected(me))
            }
        }
        self.highest_promised = Some(proposal.clone());
        self.last_accepted_proposal = Some(proposal.clone());
        self.last_accepted_value = Some(value.clone());
        Ok(Accepted {
            from: me.clone(),
            proposal,
            value,
        })
    }

    pub(crate) fn rejected(&self, me: &ReplicaId) -> Rejected {
        Rejected {
            from: me.clone(),
            promised: self.highest_promised.clone(),
        }
    }
}
