//! Vector-backed chain arenas for AC and CC blocks.
//!
//! Blocks link by previous-id in the data model; in memory both chains are
//! arenas indexed by height, with no parent pointers.

use crate::block::{AcBlock, CcBlock};
use crate::BlockHeight;

/// The local announce chain.
///
/// Heights are contiguous starting at 1. Blocks are accepted in order;
/// fork choice is out of scope (the producer race is resolved by arrival
/// order, as in the source model).
#[derive(Debug, Clone, Default)]
pub struct AcChain {
    blocks: Vec<AcBlock>,
}

impl AcChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block if it extends the tip. Returns false on any other
    /// height (stale duplicate or gap).
    pub fn append(&mut self, block: AcBlock) -> bool {
        if block.height != self.tip_height().next() {
            return false;
        }
        self.blocks.push(block);
        true
    }

    pub fn tip(&self) -> Option<&AcBlock> {
        self.blocks.last()
    }

    /// Height of the tip; `GENESIS` (0) when the chain is empty.
    pub fn tip_height(&self) -> BlockHeight {
        self.tip().map(|b| b.height).unwrap_or(BlockHeight::GENESIS)
    }

    /// Block at an exact height, if the chain covers it.
    pub fn get(&self, height: BlockHeight) -> Option<&AcBlock> {
        if height.0 == 0 {
            return None;
        }
        self.blocks.get((height.0 - 1) as usize)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AcBlock> {
        self.blocks.iter()
    }

    /// Iterate the blocks in `(lo, hi]`, oldest first.
    pub fn range(&self, lo_exclusive: BlockHeight, hi_inclusive: BlockHeight) -> impl Iterator<Item = &AcBlock> {
        self.blocks
            .iter()
            .filter(move |b| b.height > lo_exclusive && b.height <= hi_inclusive)
    }
}

/// The local consolidation chain.
///
/// Heights are contiguous starting at 0. `acb_height` values are
/// non-decreasing along the chain (each round covers a later AC prefix).
#[derive(Debug, Clone, Default)]
pub struct CcChain {
    blocks: Vec<CcBlock>,
}

impl CcChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block if it is the next height. Duplicate heights are
    /// dropped — only one CC block per height is ever accepted.
    pub fn append(&mut self, block: CcBlock) -> bool {
        let expected = self
            .tip()
            .map(|b| BlockHeight(b.height.0 + 1))
            .unwrap_or(BlockHeight(0));
        if block.height != expected {
            return false;
        }
        self.blocks.push(block);
        true
    }

    pub fn tip(&self) -> Option<&CcBlock> {
        self.blocks.last()
    }

    /// Height the next CC block should carry.
    pub fn next_height(&self) -> BlockHeight {
        self.tip()
            .map(|b| BlockHeight(b.height.0 + 1))
            .unwrap_or(BlockHeight(0))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CcBlock> {
        self.blocks.iter()
    }

    /// The earliest CC block whose coverage reaches AC height `h`, i.e. the
    /// first block with `acb_height >= h`.
    ///
    /// This is the block whose verdicts apply to a transaction-set sealed
    /// at `h`. `None` means no consolidation round has covered `h` yet.
    pub fn covering(&self, h: BlockHeight) -> Option<&CcBlock> {
        let idx = self.blocks.partition_point(|b| b.acb_height < h);
        self.blocks.get(idx)
    }

    /// Whether any CC block covers AC height `h`.
    pub fn covers(&self, h: BlockHeight) -> bool {
        self.covering(h).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    fn ac(height: u64, id: u64) -> AcBlock {
        AcBlock::new(BlockHeight(height), id, id.saturating_sub(1), NodeId(0), 0)
    }

    fn cc(height: u64, acb: u64) -> CcBlock {
        CcBlock::new(BlockHeight(height), height + 1, height, NodeId(0), BlockHeight(acb), 1, 0)
    }

    #[test]
    fn test_ac_chain_append_in_order() {
        let mut chain = AcChain::new();
        assert!(chain.append(ac(1, 1)));
        assert!(chain.append(ac(2, 2)));
        assert!(!chain.append(ac(2, 3)), "stale height rejected");
        assert!(!chain.append(ac(4, 4)), "gap rejected");
        assert_eq!(chain.tip_height(), BlockHeight(2));
        assert_eq!(chain.get(BlockHeight(1)).unwrap().id, 1);
        assert!(chain.get(BlockHeight(0)).is_none());
    }

    #[test]
    fn test_ac_chain_range() {
        let mut chain = AcChain::new();
        for h in 1..=5 {
            chain.append(ac(h, h));
        }
        let heights: Vec<u64> = chain
            .range(BlockHeight(1), BlockHeight(4))
            .map(|b| b.height.0)
            .collect();
        assert_eq!(heights, vec![2, 3, 4]);
    }

    #[test]
    fn test_cc_chain_covering() {
        let mut chain = CcChain::new();
        chain.append(cc(0, 5));
        chain.append(cc(1, 9));
        chain.append(cc(2, 14));
        assert_eq!(chain.covering(BlockHeight(3)).unwrap().acb_height.0, 5);
        assert_eq!(chain.covering(BlockHeight(5)).unwrap().acb_height.0, 5);
        assert_eq!(chain.covering(BlockHeight(6)).unwrap().acb_height.0, 9);
        assert!(chain.covering(BlockHeight(15)).is_none());
    }

    #[test]
    fn test_cc_chain_duplicate_height_dropped() {
        let mut chain = CcChain::new();
        assert!(chain.append(cc(0, 5)));
        assert!(!chain.append(cc(0, 6)));
        assert_eq!(chain.len(), 1);
    }
}
