//! Signature set for collecting committee signatures.

use ezchain_types::{CommitteeSig, NodeId};
use std::collections::BTreeSet;

/// Signatures collected by the leader for one CC block phase.
///
/// Deduplicates by signer: a committee member contributes at most one
/// signature per phase regardless of retransmissions.
#[derive(Debug, Clone, Default)]
pub struct SignatureSet {
    sigs: Vec<CommitteeSig>,
    signers: BTreeSet<NodeId>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signature. Returns false if this signer was already counted.
    pub fn insert(&mut self, sig: CommitteeSig) -> bool {
        if !self.signers.insert(sig.signer) {
            return false;
        }
        self.sigs.push(sig);
        true
    }

    /// Number of distinct signers.
    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn sigs(&self) -> &[CommitteeSig] {
        &self.sigs
    }

    pub fn clear(&mut self) {
        self.sigs.clear();
        self.signers.clear();
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
    fn test_duplicate_signer_not_counted() {
        let mut set = SignatureSet::new();
        assert!(set.insert(sig(1)));
        assert!(!set.insert(sig(1)));
        assert!(set.insert(sig(2)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut set = SignatureSet::new();
        set.insert(sig(1));
        set.clear();
        assert!(set.is_empty());
        assert!(set.insert(sig(1)));
    }
}
