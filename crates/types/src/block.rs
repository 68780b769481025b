//! AC, CC and personal-chain block types.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::proof::Proof;
use crate::transaction::Transaction;
use crate::wire::{parse_i64, parse_u64, FieldReader, WireError};
use crate::{BlockHeight, Hash, NodeId};

/// An announce-chain block: the ledger entry carrying transaction-set
/// digests for one mining round.
///
/// Immutable after production. `node_filter` records the author of every
/// referenced set; continuity validation scans it to prove an author
/// published nothing between two proof steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcBlock {
    pub height: BlockHeight,
    pub id: u64,
    pub prev_id: u64,
    pub producer: NodeId,
    /// Production time, milliseconds of simulated time.
    pub timestamp_ms: u64,
    pub node_filter: BTreeSet<NodeId>,
    pub abs_list: Vec<Hash>,
}

impl AcBlock {
    pub fn new(
        height: BlockHeight,
        id: u64,
        prev_id: u64,
        producer: NodeId,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            height,
            id,
            prev_id,
            producer,
            timestamp_ms,
            node_filter: BTreeSet::new(),
            abs_list: Vec::new(),
        }
    }

    /// Whether the block references a set with the given digest.
    pub fn lists(&self, abs: &Hash) -> bool {
        self.abs_list.contains(abs)
    }

    /// Wire form: `id,height,prev_id,producer,ts;f1 f2 ...;abs$abs$...`
    pub fn to_wire(&self) -> String {
        let mut out = format!(
            "{},{},{},{},{};",
            self.id, self.height, self.prev_id, self.producer, self.timestamp_ms
        );
        let filter: Vec<String> = self.node_filter.iter().map(|n| n.to_string()).collect();
        out.push_str(&filter.join(" "));
        out.push(';');
        for abs in &self.abs_list {
            out.push_str(&abs.to_hex());
            out.push('$');
        }
        out
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut r = FieldReader::new(s);
        let id = r.u64_until(',')?;
        let height = BlockHeight(r.u64_until(',')?);
        let prev_id = r.u64_until(',')?;
        let producer = NodeId(r.u64_until(',')?);
        let timestamp_ms = r.u64_until(';')?;
        let mut block = Self::new(height, id, prev_id, producer, timestamp_ms);
        let filter = r.until(';')?;
        for field in filter.split(' ').filter(|f| !f.is_empty()) {
            block.node_filter.insert(NodeId(parse_u64(field)?));
        }
        while !r.is_empty() {
            block.abs_list.push(Hash::from_hex(r.until('$')?)?);
        }
        Ok(block)
    }
}

/// Fate of a transaction-set as recorded by a CC block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfVerdict {
    /// The entire set is rejected (the original's `-1`).
    Rejected,
    /// A specific subset is rejected; the index addresses `fail_txn`.
    FailedSubset(usize),
}

impl InfVerdict {
    fn to_i64(self) -> i64 {
        match self {
            InfVerdict::Rejected => -1,
            InfVerdict::FailedSubset(i) => i as i64,
        }
    }

    fn from_i64(v: i64) -> Self {
        if v < 0 {
            InfVerdict::Rejected
        } else {
            InfVerdict::FailedSubset(v as usize)
        }
    }
}

/// A consolidation-chain block: the committee's verdict on the epoch's
/// transaction-sets.
///
/// `fail_txs` maps a set digest to its fate; digests absent from the map
/// are untouched. `acb_height` is the last AC height this block covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcBlock {
    pub height: BlockHeight,
    pub id: u64,
    pub prev_id: u64,
    pub producer: NodeId,
    pub acb_height: BlockHeight,
    /// Number of AC blocks produced in the covered epoch.
    pub block_epoch: u64,
    pub timestamp_ms: u64,
    /// Running count of individually failed transactions.
    pub txn_cnt: u64,
    pub fail_txs: BTreeMap<Hash, InfVerdict>,
    pub fail_txn: Vec<Vec<Transaction>>,
}

impl CcBlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        height: BlockHeight,
        id: u64,
        prev_id: u64,
        producer: NodeId,
        acb_height: BlockHeight,
        block_epoch: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            height,
            id,
            prev_id,
            producer,
            acb_height,
            block_epoch,
            timestamp_ms,
            txn_cnt: 0,
            fail_txs: BTreeMap::new(),
            fail_txn: Vec::new(),
        }
    }

    /// Mark an entire set as rejected. Overrides any subset verdict.
    pub fn mark_rejected(&mut self, abs: Hash) {
        self.fail_txs.insert(abs, InfVerdict::Rejected);
    }

    /// Mark specific transactions of a set as failed.
    ///
    /// Extends an existing subset entry for the same digest; a whole-set
    /// rejection is never downgraded.
    pub fn mark_failed(&mut self, abs: Hash, txs: Vec<Transaction>) {
        self.txn_cnt += txs.len() as u64;
        match self.fail_txs.get(&abs) {
            Some(InfVerdict::Rejected) => {}
            Some(InfVerdict::FailedSubset(i)) => {
                let i = *i;
                self.fail_txn[i].extend(txs);
            }
            None => {
                self.fail_txs.insert(abs, InfVerdict::FailedSubset(self.fail_txn.len()));
                self.fail_txn.push(txs);
            }
        }
    }

    /// Remove a digest's verdict entirely (successful appeal).
    pub fn clear_verdict(&mut self, abs: &Hash) {
        if let Some(InfVerdict::FailedSubset(i)) = self.fail_txs.remove(abs) {
            self.txn_cnt = self.txn_cnt.saturating_sub(self.fail_txn[i].len() as u64);
            self.fail_txn[i].clear();
        }
    }

    /// Verdict for a set digest, if any.
    pub fn verdict(&self, abs: &Hash) -> Option<InfVerdict> {
        self.fail_txs.get(abs).copied()
    }

    /// The failed transactions of a subset verdict.
    pub fn failed_subset(&self, abs: &Hash) -> Option<&[Transaction]> {
        match self.fail_txs.get(abs)? {
            InfVerdict::Rejected => None,
            InfVerdict::FailedSubset(i) => self.fail_txn.get(*i).map(|v| v.as_slice()),
        }
    }

    /// Wire form: header fields `$`-closed, then `hex,verdict$` per set,
    /// then per failed group `%` followed by the group's transactions.
    pub fn to_wire(&self) -> String {
        let mut out = format!(
            "{},{},{},{},{},{},{},{}$",
            self.id,
            self.height,
            self.prev_id,
            self.producer,
            self.acb_height,
            self.block_epoch,
            self.timestamp_ms,
            self.txn_cnt
        );
        for (abs, verdict) in &self.fail_txs {
            out.push_str(&abs.to_hex());
            out.push(',');
            out.push_str(&verdict.to_i64().to_string());
            out.push('$');
        }
        for group in &self.fail_txn {
            out.push('%');
            for tx in group {
                out.push_str(&tx.to_wire());
            }
        }
        out
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut r = FieldReader::new(s);
        let id = r.u64_until(',')?;
        let height = BlockHeight(r.u64_until(',')?);
        let prev_id = r.u64_until(',')?;
        let producer = NodeId(r.u64_until(',')?);
        let acb_height = BlockHeight(r.u64_until(',')?);
        let block_epoch = r.u64_until(',')?;
        let timestamp_ms = r.u64_until(',')?;
        let txn_cnt = r.u64_until('$')?;
        let mut block = Self::new(
            height,
            id,
            prev_id,
            producer,
            acb_height,
            block_epoch,
            timestamp_ms,
        );
        block.txn_cnt = txn_cnt;
        while !r.is_empty() && !r.peek_is('%') {
            let abs = Hash::from_hex(r.until(',')?)?;
            let verdict = InfVerdict::from_i64(parse_i64(r.until('$')?)?);
            block.fail_txs.insert(abs, verdict);
        }
        while !r.is_empty() {
            r.skip('%')?;
            let mut group = Vec::new();
            while !r.is_empty() && !r.peek_is('%') {
                group.push(Transaction::read(&mut r)?);
            }
            block.fail_txn.push(group);
        }
        Ok(block)
    }
}

/// One entry of a node's personal chain: a transaction-set this node
/// authored, sealed into an AC block at `height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalBlock {
    pub height: BlockHeight,
    pub txs: Vec<Transaction>,
    pub prfs: Vec<Proof>,
    pub digest: Hash,
}

impl PersonalBlock {
    /// Wire form: `height$tx tx ...$prf\tprf\t...$digest` (transactions are
    /// self-delimited by `;`).
    pub fn to_wire(&self) -> String {
        let mut out = format!("{}$", self.height);
        for tx in &self.txs {
            out.push_str(&tx.to_wire());
        }
        out.push('$');
        for prf in &self.prfs {
            out.push_str(&prf.to_wire());
            out.push('\t');
        }
        out.push('$');
        out.push_str(&self.digest.to_hex());
        out
    }

    pub fn from_wire(s: &str) -> Result<Self, WireError> {
        let mut r = FieldReader::new(s);
        let height = BlockHeight(r.u64_until('$')?);
        let mut txs = Vec::new();
        while !r.peek_is('$') {
            if r.is_empty() {
                return Err(WireError::Truncated);
            }
            txs.push(Transaction::read(&mut r)?);
        }
        r.skip('$')?;
        let mut prfs = Vec::new();
        while !r.peek_is('$') {
            if r.is_empty() {
                return Err(WireError::Truncated);
            }
            prfs.push(Proof::from_wire(r.until('\t')?)?);
        }
        r.skip('$')?;
        let digest = Hash::from_hex(r.rest())?;
        Ok(Self {
            height,
            txs,
            prfs,
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TxId, ValueId};

    fn tx(id: u64, val: u64, owner: u64, recv: u64) -> Transaction {
        Transaction::new(TxId(id), ValueId(val), NodeId(owner), NodeId(recv))
    }

    #[test]
    fn test_ac_block_wire_roundtrip() {
        let mut block = AcBlock::new(BlockHeight(3), 17, 12, NodeId(4), 2500);
        block.node_filter.insert(NodeId(1));
        block.node_filter.insert(NodeId(4));
        block.abs_list.push(Hash::digest(b"inf-a"));
        block.abs_list.push(Hash::digest(b"inf-b"));
        let parsed = AcBlock::from_wire(&block.to_wire()).unwrap();
        assert_eq!(block, parsed);
    }

    #[test]
    fn test_ac_block_empty_filter_roundtrip() {
        let block = AcBlock::new(BlockHeight(1), 1, 0, NodeId(0), 0);
        let parsed = AcBlock::from_wire(&block.to_wire()).unwrap();
        assert_eq!(block, parsed);
    }

    #[test]
    fn test_cc_block_wire_roundtrip() {
        let mut block = CcBlock::new(BlockHeight(2), 9, 5, NodeId(1), BlockHeight(14), 3, 8000);
        block.mark_rejected(Hash::digest(b"missing"));
        block.mark_failed(Hash::digest(b"partial"), vec![tx(5, 2, 0, 1), tx(6, 3, 0, 2)]);
        let parsed = CcBlock::from_wire(&block.to_wire()).unwrap();
        assert_eq!(block, parsed);
        assert_eq!(
            parsed.verdict(&Hash::digest(b"missing")),
            Some(InfVerdict::Rejected)
        );
        assert_eq!(parsed.failed_subset(&Hash::digest(b"partial")).unwrap().len(), 2);
    }

    #[test]
    fn test_cc_rejection_not_downgraded() {
        let mut block = CcBlock::new(BlockHeight(0), 1, 0, NodeId(0), BlockHeight(5), 1, 0);
        let abs = Hash::digest(b"set");
        block.mark_rejected(abs);
        block.mark_failed(abs, vec![tx(1, 1, 0, 1)]);
        assert_eq!(block.verdict(&abs), Some(InfVerdict::Rejected));
    }

    #[test]
    fn test_personal_block_wire_roundtrip() {
        let block = PersonalBlock {
            height: BlockHeight(6),
            txs: vec![tx(1, 1, 0, 1), tx(2, 2, 0, 3)],
            prfs: vec![Proof::new(NodeId(0), ValueId(1), BlockHeight::GENESIS)],
            digest: Hash::digest(b"set"),
        };
        let parsed = PersonalBlock::from_wire(&block.to_wire()).unwrap();
        assert_eq!(block, parsed);
    }
}
