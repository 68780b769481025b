//! The node's personal chain.

use ezchain_types::{Hash, PersonalBlock};

/// Ordered log of the node's own sealed transaction-sets, keyed by the AC
/// height each was sealed at.
///
/// Proofs grow from here: before transferring a Value, the holder appends
/// every personal block at or after the proof's last recorded height.
#[derive(Debug, Default)]
pub struct PersonalChain {
    blocks: Vec<PersonalBlock>,
}

impl PersonalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, block: PersonalBlock) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[PersonalBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The sealed set with the given digest, if this node authored it.
    pub fn find_by_digest(&self, digest: &Hash) -> Option<&PersonalBlock> {
        self.blocks.iter().find(|b| b.digest == *digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_types::BlockHeight;

    #[test]
    fn test_find_by_digest() {
        let mut chain = PersonalChain::new();
        let block = PersonalBlock {
            height: BlockHeight(3),
            txs: vec![],
            prfs: vec![],
            digest: Hash::digest(b"mine"),
        };
        chain.append(block);
        assert!(chain.find_by_digest(&Hash::digest(b"mine")).is_some());
        assert!(chain.find_by_digest(&Hash::digest(b"other")).is_none());
    }
}
