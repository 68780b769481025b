//! Value proofs: the per-Value chain of transaction-sets.

use crate::block::PersonalBlock;
use crate::transaction::{digest_of_txs, Transaction};
use crate::wire::{parse_u64, FieldReader, WireError};
use crate::{BlockHeight, Hash, NodeId, ValueId};

/// One step of a proof: a full transaction-set at the AC height where it
/// was sealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofStep {
    pub txs: Vec<Transaction>,
    pub height: BlockHeight,
}

impl ProofStep {
    /// The single author of this set, if the set is non-empty.
    pub fn author(&self) -> Option<NodeId> {
        self.txs.first().map(|tx| tx.owner)
    }

    /// Digest over the serialized transactions, matching the AC abstract.
    pub fn digest(&self) -> Hash {
        digest_of_txs(self.txs.iter())
    }
}

/// Proof of ownership for a single Value.
///
/// A sequence of transaction-sets at non-decreasing AC heights witnessing
/// the chain of custody from the genesis owner (or the latest consolidation
/// anchor) to the current holder. Grows every time its holder authors a
/// set, and is compacted on each accepted CC block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    /// Genesis owner of the Value.
    pub init_id: NodeId,
    /// Height at which the Value was created.
    pub init_height: BlockHeight,
    /// The Value this proof is for.
    pub value: ValueId,
    steps: Vec<ProofStep>,
}

impl Proof {
    /// A fresh proof for a newly minted Value.
    pub fn new(init_id: NodeId, value: ValueId, init_height: BlockHeight) -> Self {
        Self {
            init_id,
            init_height,
            value,
            steps: Vec::new(),
        }
    }

    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a transaction-set at the given height.
    pub fn push_step(&mut self, txs: Vec<Transaction>, height: BlockHeight) {
        self.steps.push(ProofStep { txs, height });
    }

    /// Height of the first recorded set.
    pub fn first_height(&self) -> Option<BlockHeight> {
        self.steps.first().map(|s| s.height)
    }

    /// Height of the last recorded set, or the genesis height if none.
    pub fn last_height(&self) -> BlockHeight {
        self.steps.last().map(|s| s.height).unwrap_or(self.init_height)
    }

    /// Total number of transactions across all sets.
    pub fn tx_count(&self) -> usize {
        self.steps.iter().map(|s| s.txs.len()).sum()
    }

    /// Extend with every set this node sealed at or after the proof's last
    /// recorded height.
    ///
    /// Called by the holder before transferring the Value: the sets the
    /// holder published between acquiring the Value and spending it must
    /// appear in the proof, or continuity validation will reject it.
    /// Idempotent — a set already recorded is not appended twice.
    pub fn extend_from_personal(&mut self, chain: &[PersonalBlock]) {
        let cut = self.last_height();
        for block in chain {
            if block.height < cut || block.txs.is_empty() {
                continue;
            }
            let duplicate = self
                .steps
                .iter()
                .rev()
                .take_while(|s| s.height >= block.height)
                .any(|s| s.digest() == block.digest);
            if !duplicate {
                self.steps.push(ProofStep {
                    txs: block.txs.clone(),
                    height: block.height,
                });
            }
        }
    }

    /// Trim everything before the consolidation boundary `to`.
    ///
    /// The latest step strictly below `to` becomes the anchor: it shows
    /// current ownership for history the CC chain has already finalized.
    /// Everything before it is dropped. Returns the number of sets removed.
    pub fn compact(&mut self, to: BlockHeight) -> usize {
        for idx in (0..self.steps.len()).rev() {
            if self.steps[idx].height < to {
                self.steps.drain(0..idx);
                return idx;
            }
        }
        0
    }

    /// Wire form: `n,init_id,init_height,value;` then each step's
    /// transactions followed by `/height|`, closed by `-txcount`.
    pub fn to_wire(&self) -> String {
        let mut out = format!(
            "{},{},{},{};",
            self.steps.len(),
            self.init_id,
            self.init_height,
            self.value
        );
        for step in &self.steps {
            for tx in &step.txs {
                out.push_str(&tx.to_wire());
            }
            out.push('/');
            out.push_str(&step.height.to_string());
            out.push('|');
        }
        out.push('-');
        out.push_str(&self.tx_count().to_string());
        out
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut r = FieldReader::new(s);
        let n = r.u64_until(',')? as usize;
        let init_id = NodeId(r.u64_until(',')?);
        let init_height = BlockHeight(r.u64_until(',')?);
        let value = ValueId(r.u64_until(';')?);
        let mut steps = Vec::with_capacity(n);
        for _ in 0..n {
            let mut txs = Vec::new();
            while !r.peek_is('/') {
                if r.is_empty() {
                    return Err(WireError::Truncated);
                }
                txs.push(Transaction::read(&mut r)?);
            }
            r.skip('/')?;
            let height = BlockHeight(r.u64_until('|')?);
            steps.push(ProofStep { txs, height });
        }
        r.skip('-')?;
        // Trailing count is derived; parse for format validity only.
        parse_u64(r.rest())?;
        Ok(Self {
            init_id,
            init_height,
            value,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxId;

    fn tx(id: u64, val: u64, owner: u64, recv: u64, h: u64) -> Transaction {
        let mut t = Transaction::new(TxId(id), ValueId(val), NodeId(owner), NodeId(recv));
        t.acb_height = BlockHeight(h);
        t
    }

    fn proof_with_heights(heights: &[u64]) -> Proof {
        let mut p = Proof::new(NodeId(0), ValueId(1), BlockHeight::GENESIS);
        for (i, &h) in heights.iter().enumerate() {
            p.push_step(vec![tx(i as u64, 1, 0, 1, h)], BlockHeight(h));
        }
        p
    }

    #[test]
    fn test_wire_roundtrip_empty() {
        let p = Proof::new(NodeId(3), ValueId(9), BlockHeight::GENESIS);
        let parsed = Proof::from_wire(&p.to_wire()).unwrap();
        assert_eq!(p, parsed);
    }

    #[test]
    fn test_wire_roundtrip_multi_step() {
        let mut p = proof_with_heights(&[1, 3, 3, 7]);
        p.push_step(
            vec![tx(10, 1, 0, 1, 9), tx(11, 2, 0, 2, 9)],
            BlockHeight(9),
        );
        let parsed = Proof::from_wire(&p.to_wire()).unwrap();
        assert_eq!(p, parsed);
        assert_eq!(parsed.tx_count(), 6);
    }

    #[test]
    fn test_compact_keeps_anchor() {
        let mut p = proof_with_heights(&[1, 2, 3, 4, 6]);
        // Boundary 5: the latest step below it (height 4) is the anchor.
        let removed = p.compact(BlockHeight(5));
        assert_eq!(removed, 3);
        let heights: Vec<u64> = p.steps().iter().map(|s| s.height.0).collect();
        assert_eq!(heights, vec![4, 6]);
    }

    #[test]
    fn test_compact_noop_when_all_after_boundary() {
        let mut p = proof_with_heights(&[8, 9]);
        assert_eq!(p.compact(BlockHeight(5)), 0);
        assert_eq!(p.steps().len(), 2);
    }

    #[test]
    fn test_compact_all_below_keeps_latest() {
        let mut p = proof_with_heights(&[1, 2, 3]);
        assert_eq!(p.compact(BlockHeight(9)), 2);
        let heights: Vec<u64> = p.steps().iter().map(|s| s.height.0).collect();
        assert_eq!(heights, vec![3]);
    }

    #[test]
    fn test_extend_from_personal_skips_older_sets() {
        let mut p = proof_with_heights(&[4]);
        let chain = vec![
            PersonalBlock {
                height: BlockHeight(2),
                txs: vec![tx(1, 5, 0, 1, 2)],
                prfs: vec![],
                digest: Hash::ZERO,
            },
            PersonalBlock {
                height: BlockHeight(5),
                txs: vec![tx(2, 6, 0, 2, 5)],
                prfs: vec![],
                digest: Hash::ZERO,
            },
        ];
        p.extend_from_personal(&chain);
        let heights: Vec<u64> = p.steps().iter().map(|s| s.height.0).collect();
        assert_eq!(heights, vec![4, 5]);
    }
}
