//! Core traits for state machines and opaque collaborators.

use crate::{Action, ProtocolEvent};
use ezchain_types::{CommitteeSig, NodeId};
use std::collections::BTreeSet;
use std::time::Duration;

/// A state machine that processes events.
///
/// All protocol logic is implemented as state machines that are:
///
/// - **Synchronous**: no async, no `.await`; every handler runs to completion
/// - **Deterministic**: same state + event = same actions
/// - **Pure-ish**: mutates self, but performs no I/O
///
/// All I/O is handled by the runner, which delivers events, executes the
/// returned actions, and converts deliveries back into events.
pub trait StateMachine {
    /// Process an event, returning actions for the runner to execute.
    fn handle(&mut self, event: ProtocolEvent) -> Vec<Action>;

    /// Set the current time. Called by the runner before each `handle()`.
    fn set_time(&mut self, now: Duration);

    /// The time last set via `set_time()`.
    fn now(&self) -> Duration;
}

/// Opaque threshold-signature predicate.
///
/// The core treats the signature scheme as a black box: a signature set is
/// valid when the verifier says so and it represents more than half of the
/// committee.
pub trait ThresholdVerifier: Send + Sync {
    /// Whether `sigs` forms a valid threshold signature for `committee`.
    fn verify(&self, sigs: &[CommitteeSig], committee: &BTreeSet<NodeId>) -> bool;
}

/// Counting verifier: accepts any set of distinct committee signers larger
/// than half the committee.
///
/// This realizes the `> ⌊|committee|/2⌋` predicate only; a deployment must
/// substitute a real threshold-signature verifier before claiming security.
pub struct MajorityVerifier;

impl ThresholdVerifier for MajorityVerifier {
    fn verify(&self, sigs: &[CommitteeSig], committee: &BTreeSet<NodeId>) -> bool {
        let signers: BTreeSet<NodeId> = sigs
            .iter()
            .map(|s| s.signer)
            .filter(|s| committee.contains(s))
            .collect();
        signers.len() > committee.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_types::SigPhase;

    fn sig(signer: u64) -> CommitteeSig {
        CommitteeSig {
            ccb_id: 1,
            signer: NodeId(signer),
            leader: NodeId(0),
            timestamp_ms: 0,
            phase: SigPhase::Notice,
        }
    }

    #[test]
    fn test_majority_verifier_threshold() {
        let committee: BTreeSet<NodeId> = (0..4).map(NodeId).collect();
        let verifier = MajorityVerifier;
        assert!(!verifier.verify(&[sig(0), sig(1)], &committee));
        assert!(verifier.verify(&[sig(0), sig(1), sig(2)], &committee));
    }

    #[test]
    fn test_majority_verifier_ignores_outsiders_and_duplicates() {
        let committee: BTreeSet<NodeId> = (0..4).map(NodeId).collect();
        let verifier = MajorityVerifier;
        // Duplicates and non-members do not count towards quorum.
        assert!(!verifier.verify(&[sig(0), sig(0), sig(9), sig(10)], &committee));
    }
}
