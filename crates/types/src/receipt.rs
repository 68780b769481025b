//! Transfer receipts.

use crate::proof::Proof;
use crate::transaction::Transaction;
use crate::wire::{FieldReader, WireError};
use crate::{BlockHeight, NodeId};

/// Notification to the recipient of a transaction that its enclosing set
/// reached the AC chain.
///
/// Carries the full transaction list of the set (for digest re-verification),
/// the index of the specific transaction, the extended proof, and the AC
/// height of the sealing block. The recipient runs `get_owner` over the
/// proof and adopts the Value on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// The node that transferred the Value (author of the set).
    pub sender: NodeId,
    /// The node the Value was transferred to.
    pub recv: NodeId,
    /// Height of the AC block that sealed the set.
    pub height: BlockHeight,
    /// Index of the transferring transaction within `txs`.
    pub tx_idx: usize,
    /// Every transaction of the sealed set.
    pub txs: Vec<Transaction>,
    /// Ownership proof ending with the sealed set itself.
    pub proof: Proof,
}

impl Receipt {
    /// The transaction this receipt is for, if `tx_idx` is in range.
    pub fn tx(&self) -> Option<&Transaction> {
        self.txs.get(self.tx_idx)
    }

    /// Wire form: `sender,recv,height,tx_idx$tx$tx$...$proof` — the proof
    /// contains no `$`, so the last `$` closes the transaction list.
    pub fn to_wire(&self) -> String {
        let mut out = format!(
            "{},{},{},{}$",
            self.sender, self.recv, self.height, self.tx_idx
        );
        for tx in &self.txs {
            out.push_str(&tx.to_wire());
            out.push('$');
        }
        out.push_str(&self.proof.to_wire());
        out
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut r = FieldReader::new(s);
        let sender = NodeId(r.u64_until(',')?);
        let recv = NodeId(r.u64_until(',')?);
        let height = BlockHeight(r.u64_until(',')?);
        let tx_idx = r.u64_until('$')? as usize;
        let rest = r.rest();
        let split = rest
            .rfind('$')
            .ok_or(WireError::MissingDelimiter('$'))?;
        let mut txs = Vec::new();
        let mut txs_reader = FieldReader::new(&rest[..split]);
        while !txs_reader.is_empty() {
            let record = txs_reader.until('$')?;
            txs.push(Transaction::from_wire(record)?);
        }
        let proof = Proof::from_wire(&rest[split + 1..])?;
        Ok(Self {
            sender,
            recv,
            height,
            tx_idx,
            txs,
            proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Hash, TxId, ValueId};

    #[test]
    fn test_receipt_wire_roundtrip() {
        let mut tx0 = Transaction::new(TxId(1), ValueId(7), NodeId(0), NodeId(1));
        tx0.acb_height = BlockHeight(4);
        let mut tx1 = Transaction::new(TxId(2), ValueId(8), NodeId(0), NodeId(2));
        tx1.acb_height = BlockHeight(4);

        let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
        proof.push_step(vec![tx0.clone(), tx1.clone()], BlockHeight(4));

        let receipt = Receipt {
            sender: NodeId(0),
            recv: NodeId(1),
            height: BlockHeight(4),
            tx_idx: 0,
            txs: vec![tx0, tx1],
            proof,
        };
        let parsed = Receipt::from_wire(&receipt.to_wire()).unwrap();
        assert_eq!(receipt, parsed);
        assert_eq!(parsed.tx().unwrap().value, ValueId(7));
    }

    #[test]
    fn test_receipt_digest_matches_step() {
        let tx0 = Transaction::new(TxId(1), ValueId(7), NodeId(0), NodeId(1));
        let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
        proof.push_step(vec![tx0.clone()], BlockHeight(2));
        let receipt = Receipt {
            sender: NodeId(0),
            recv: NodeId(1),
            height: BlockHeight(2),
            tx_idx: 0,
            txs: vec![tx0],
            proof,
        };
        let set_digest = crate::transaction::digest_of_txs(receipt.txs.iter());
        assert_eq!(set_digest, receipt.proof.steps().last().unwrap().digest());
        assert_ne!(set_digest, Hash::ZERO);
    }
}
