//! Committee-protocol payloads: signatures, γ₁ exchanges, appeals.

use crate::transaction::TransactionSet;
use crate::{BlockHeight, Hash, NodeId};

/// Which CC message a committee signature endorses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigPhase {
    /// Signature over the leader's draft (γ₂); quorum releases the
    /// network-wide notice.
    Notice,
    /// Signature over the amended block (γ₄); quorum releases the final
    /// CC block.
    Final,
}

/// A committee member's signature over a CC block.
///
/// Signature verification itself is an opaque predicate; the payload
/// carries only what the threshold check needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeSig {
    /// Id of the CC block being signed.
    pub ccb_id: u64,
    /// The signing committee member.
    pub signer: NodeId,
    /// The leader the signature is addressed to.
    pub leader: NodeId,
    /// Signing time, milliseconds of simulated time.
    pub timestamp_ms: u64,
    /// The phase this signature belongs to.
    pub phase: SigPhase,
}

impl CommitteeSig {
    /// Digest over the signature payload, used as the dedup key.
    pub fn digest(&self) -> Hash {
        let phase = match self.phase {
            SigPhase::Notice => 0u8,
            SigPhase::Final => 1u8,
        };
        Hash::digest_parts(&[
            &self.ccb_id.to_le_bytes(),
            &self.signer.0.to_le_bytes(),
            &self.leader.0.to_le_bytes(),
            &self.timestamp_ms.to_le_bytes(),
            &[phase],
        ])
    }
}

/// γ₁ payload: one committee member's accumulated accepted transaction-sets
/// from the past epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfExchange {
    pub producer: NodeId,
    /// Height of the CC block under construction.
    pub cc_height: BlockHeight,
    /// Last AC height the round covers.
    pub acb_height: BlockHeight,
    /// AC blocks produced in the covered epoch.
    pub block_epoch: u64,
    /// The sets this member saw during the epoch.
    pub infs: Vec<TransactionSet>,
}

/// γ₃ payload: a proof-of-spend contesting a draft verdict.
///
/// The appellant reveals the full transaction-set the draft marked failed;
/// the committee re-validates it and clears the verdict on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appeal {
    pub appellant: NodeId,
    pub inf: TransactionSet,
}
