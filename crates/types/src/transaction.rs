//! Transactions and transaction-sets (Inf).

use crate::proof::Proof;
use crate::wire::{FieldReader, WireError};
use crate::{BlockHeight, Hash, NodeId, TxId, ValueId};

/// A single transfer of one Value from `owner` to `recv`.
///
/// `acb_height` is zero until the enclosing transaction-set is sealed into
/// an AC block, at which point it records that block's height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub tx_id: TxId,
    pub value: ValueId,
    pub owner: NodeId,
    pub recv: NodeId,
    pub acb_height: BlockHeight,
}

impl Transaction {
    pub fn new(tx_id: TxId, value: ValueId, owner: NodeId, recv: NodeId) -> Self {
        Self {
            tx_id,
            value,
            owner,
            recv,
            acb_height: BlockHeight::GENESIS,
        }
    }

    /// Structural validity: a node never transfers a Value to itself.
    pub fn check(&self) -> bool {
        self.owner != self.recv
    }

    /// Wire form: `tx_id,value,owner,acb_height,recv;`
    pub fn to_wire(&self) -> String {
        format!(
            "{},{},{},{},{};",
            self.tx_id, self.value, self.owner, self.acb_height, self.recv
        )
    }

    /// Serialization as authored, before the enclosing set reached a block.
    ///
    /// Set digests are computed over this form: it is identical on every
    /// node regardless of whether `acb_height` has been filled into the
    /// copy at hand.
    pub fn to_authored_wire(&self) -> String {
        format!(
            "{},{},{},0,{};",
            self.tx_id, self.value, self.owner, self.recv
        )
    }

    /// Whether two records describe the same transfer, regardless of where
    /// they were recorded (ignores `acb_height`).
    pub fn same_transfer(&self, other: &Transaction) -> bool {
        self.tx_id == other.tx_id
            && self.value == other.value
            && self.owner == other.owner
            && self.recv == other.recv
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut r = FieldReader::new(s);
        let tx = Self::read(&mut r)?;
        if !r.is_empty() {
            return Err(WireError::TrailingData);
        }
        Ok(tx)
    }

    /// Read one transaction record (through its closing `;`) from a reader.
    pub fn read(r: &mut FieldReader<'_>) -> Result<Self, WireError> {
        let tx_id = TxId(r.u64_until(',')?);
        let value = ValueId(r.u64_until(',')?);
        let owner = NodeId(r.u64_until(',')?);
        let acb_height = BlockHeight(r.u64_until(',')?);
        let recv = NodeId(r.u64_until(';')?);
        Ok(Self {
            tx_id,
            value,
            owner,
            recv,
            acb_height,
        })
    }
}

/// One entry of a transaction-set: a transaction together with the proof
/// that its author held the spent Value when the transaction was minted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfEntry {
    pub tx: Transaction,
    pub proof: Proof,
}

/// A transaction-set (Inf): the unit of publication on the AC chain.
///
/// An unordered bag of transactions all authored by `owner`, plus the
/// digest `abs` over the concatenated serialized transactions in insertion
/// order. `height` is filled in when the set is packed into an AC block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSet {
    pub owner: NodeId,
    pub entries: Vec<InfEntry>,
    pub abs: Hash,
    pub height: BlockHeight,
}

impl TransactionSet {
    /// Seal a set of entries, computing the digest.
    pub fn seal(owner: NodeId, entries: Vec<InfEntry>) -> Self {
        let mut set = Self {
            owner,
            entries,
            abs: Hash::ZERO,
            height: BlockHeight::GENESIS,
        };
        set.abs = set.compute_digest();
        set
    }

    /// Digest over the concatenated serialized transactions, insertion order.
    ///
    /// This must be byte-for-byte identical across nodes; it is the binding
    /// between an AC block's `abs_list` and the set contents.
    pub fn compute_digest(&self) -> Hash {
        digest_of_txs(self.entries.iter().map(|e| &e.tx))
    }

    pub fn txs(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().map(|e| &e.tx)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Wire form: `owner,n$` then each entry as `<tx><proof>$`, then
    /// `abs,height`.
    pub fn to_wire(&self) -> String {
        let mut out = format!("{},{}$", self.owner, self.entries.len());
        for entry in &self.entries {
            out.push_str(&entry.tx.to_wire());
            out.push_str(&entry.proof.to_wire());
            out.push('$');
        }
        out.push_str(&self.abs.to_hex());
        out.push(',');
        out.push_str(&self.height.to_string());
        out
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut r = FieldReader::new(s);
        let owner = NodeId(r.u64_until(',')?);
        let n = r.u64_until('$')? as usize;
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let entry = r.until('$')?;
            // A transaction record closes with `;`; the proof follows it.
            let split = entry
                .find(';')
                .ok_or(WireError::MissingDelimiter(';'))?;
            let tx = Transaction::from_wire(&entry[..=split])?;
            let proof = Proof::from_wire(&entry[split + 1..])?;
            entries.push(InfEntry { tx, proof });
        }
        let abs = Hash::from_hex(r.until(',')?)?;
        let height = BlockHeight(crate::wire::parse_u64(r.rest())?);
        Ok(Self {
            owner,
            entries,
            abs,
            height,
        })
    }
}

/// Digest over an iterator of transactions, in order.
///
/// Uses the authored serialization so the digest is byte-for-byte identical
/// across nodes and stable across sealing.
pub fn digest_of_txs<'a>(txs: impl Iterator<Item = &'a Transaction>) -> Hash {
    let mut buf = String::new();
    for tx in txs {
        buf.push_str(&tx.to_authored_wire());
    }
    Hash::digest(buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u64, val: u64, owner: u64, recv: u64) -> Transaction {
        Transaction::new(TxId(id), ValueId(val), NodeId(owner), NodeId(recv))
    }

    #[test]
    fn test_tx_wire_roundtrip() {
        let mut t = tx(7, 3, 0, 2);
        t.acb_height = BlockHeight(5);
        let parsed = Transaction::from_wire(&t.to_wire()).unwrap();
        assert_eq!(t, parsed);
    }

    #[test]
    fn test_tx_self_transfer_rejected() {
        let t = tx(1, 1, 4, 4);
        assert!(!t.check());
        assert!(tx(1, 1, 4, 5).check());
    }

    #[test]
    fn test_inf_digest_binds_order() {
        let a = tx(1, 10, 0, 1);
        let b = tx(2, 11, 0, 2);
        let p = Proof::new(NodeId(0), ValueId(10), BlockHeight::GENESIS);
        let set_ab = TransactionSet::seal(
            NodeId(0),
            vec![
                InfEntry {
                    tx: a.clone(),
                    proof: p.clone(),
                },
                InfEntry {
                    tx: b.clone(),
                    proof: p.clone(),
                },
            ],
        );
        let set_ba = TransactionSet::seal(
            NodeId(0),
            vec![
                InfEntry {
                    tx: b,
                    proof: p.clone(),
                },
                InfEntry { tx: a, proof: p },
            ],
        );
        assert_ne!(set_ab.abs, set_ba.abs);
    }

    #[test]
    fn test_digest_stable_across_sealing() {
        let authored = tx(1, 10, 0, 1);
        let mut recorded = authored.clone();
        recorded.acb_height = BlockHeight(7);
        let a = digest_of_txs(std::slice::from_ref(&authored).iter());
        let b = digest_of_txs(std::slice::from_ref(&recorded).iter());
        assert_eq!(a, b);
        assert!(recorded.same_transfer(&authored));
    }

    #[test]
    fn test_inf_wire_roundtrip() {
        let p = Proof::new(NodeId(0), ValueId(10), BlockHeight::GENESIS);
        let mut set = TransactionSet::seal(
            NodeId(0),
            vec![InfEntry {
                tx: tx(1, 10, 0, 1),
                proof: p,
            }],
        );
        set.height = BlockHeight(4);
        let parsed = TransactionSet::from_wire(&set.to_wire()).unwrap();
        assert_eq!(set, parsed);
        assert_eq!(parsed.compute_digest(), parsed.abs);
    }
}
