//! The `get_owner` predicate and its supporting checks.
//!
//! `get_owner` decides whether a proof legitimately places a Value in the
//! claimed holder's hands: structure first, then a scan of author groups
//! checking continuity against the AC chain, validity under the CC chain,
//! and the exactly-once spend rule.
//!
//! Continuity is gap-free: from the genesis height (or the compaction
//! anchor) through every recorded set, and — for pre-inclusion claims —
//! on to the validation horizon. An author group that skips any block
//! carrying that author's sets is incomplete.

use crate::error::ValidationError;
use ezchain_types::{
    digest_of_txs, AcChain, BlockHeight, CcChain, Hash, InfVerdict, NodeId, Proof, ProofStep,
    Receipt, Transaction, TransactionSet,
};
use tracing::trace;

/// What a proof is being validated for.
#[derive(Debug, Clone, Copy)]
pub enum OwnerContext<'a> {
    /// Transaction-set admission: the proof must show `author` currently
    /// holds the Value (the spending transaction is not yet on chain).
    PreInclusion {
        author: NodeId,
        /// Last AC height the author must be fully accounted up to.
        horizon: BlockHeight,
        /// Digest of the set under admission; the block sealing it is
        /// exempt from the author-absence scan.
        own_abs: Option<Hash>,
    },

    /// Receipt handling: the proof must end with the sealed set that
    /// transfers the Value to `local`.
    Receipt {
        receipt: &'a Receipt,
        local: NodeId,
    },
}

/// Structural sanity of a proof: heights are non-decreasing and every step
/// is authored by a single node.
pub fn proof_structure(prf: &Proof) -> Result<(), ValidationError> {
    let mut prev = BlockHeight::GENESIS;
    for step in prf.steps() {
        if step.height < prev {
            return Err(ValidationError::ProofMalformed(prf.value));
        }
        prev = step.height;
        let author = step.author().ok_or(ValidationError::EmptyProof)?;
        if step.txs.iter().any(|tx| tx.owner != author) {
            return Err(ValidationError::ProofMalformed(prf.value));
        }
    }
    Ok(())
}

/// Reject if `author` published any set in `(lo, hi]` — except in a block
/// sealing `exempt` itself.
fn author_absent(
    ac: &AcChain,
    author: NodeId,
    lo_exclusive: BlockHeight,
    hi_inclusive: BlockHeight,
    exempt: Option<Hash>,
) -> Result<(), ValidationError> {
    for block in ac.range(lo_exclusive, hi_inclusive) {
        if block.node_filter.contains(&author)
            && !exempt.map_or(false, |abs| block.lists(&abs))
        {
            return Err(ValidationError::Incomplete {
                author,
                height: block.height,
            });
        }
    }
    Ok(())
}

/// Continuity check for one proof step.
///
/// The AC block at exactly `h` must list the step's digest, and no block
/// strictly between `prev_h` and `h` may carry a set from the same author
/// (the author cannot have silently spent the Value elsewhere).
pub fn check_abstract(
    ac: &AcChain,
    prev_h: BlockHeight,
    h: BlockHeight,
    author: NodeId,
    step: &ProofStep,
) -> Result<Hash, ValidationError> {
    let block = ac.get(h).ok_or(ValidationError::Incomplete { author, height: h })?;
    if prev_h < h {
        author_absent(ac, author, prev_h, BlockHeight(h.0 - 1), None)?;
    }
    let abs = step.digest();
    if !block.lists(&abs) {
        return Err(ValidationError::Incomplete { author, height: h });
    }
    Ok(abs)
}

/// Decide whether `prf` legitimately supports the ownership claim in `ctx`.
pub fn get_owner(
    prf: &Proof,
    ctx: OwnerContext<'_>,
    ac: &AcChain,
    cc: &CcChain,
) -> Result<(), ValidationError> {
    proof_structure(prf)?;

    if let OwnerContext::Receipt { receipt, local } = ctx {
        let tx = receipt
            .tx()
            .ok_or(ValidationError::ProofMalformed(prf.value))?;
        if !tx.check() {
            return Err(ValidationError::TxMalformed);
        }
        if tx.recv != local {
            return Err(ValidationError::WrongRecipient {
                addressed: tx.recv,
                local,
            });
        }
        // The proof must end with the sealed set the receipt reports.
        let abs = digest_of_txs(receipt.txs.iter());
        match prf.steps().last() {
            Some(step) if step.digest() == abs && step.height == receipt.height => {}
            Some(_) => return Err(ValidationError::InfAbs { claimed: abs }),
            None => return Err(ValidationError::EmptyProof),
        }
    }

    let steps = prf.steps();
    if steps.is_empty() {
        // No transfer recorded yet: ownership rests with the genesis
        // owner, who must be fully accounted up to the horizon.
        return match ctx {
            OwnerContext::PreInclusion {
                author,
                horizon,
                own_abs,
            } if author == prf.init_id => {
                author_absent(ac, author, prf.init_height, horizon, own_abs)
            }
            OwnerContext::PreInclusion { author, .. } => Err(ValidationError::WrongOwner {
                claimed: author,
                found: prf.init_id,
            }),
            OwnerContext::Receipt { .. } => Err(ValidationError::EmptyProof),
        };
    }

    // Genesis / anchor check. When no CC round covers the proof's first
    // step, the proof must start with the genesis owner and account for
    // everything since the genesis height; otherwise the first step is the
    // compaction anchor and is vouched for by the finalized chain.
    let first_h = steps[0].height;
    let mut prev_h = first_h;
    if !cc.covers(first_h) {
        let first_author = steps[0].author().ok_or(ValidationError::EmptyProof)?;
        if first_author != prf.init_id || first_h < prf.init_height {
            return Err(ValidationError::BadGenesis { value: prf.value });
        }
        prev_h = prf.init_height;
    }

    // Scan the proof in order, grouping consecutive sets by author.
    let mut i = 0usize;
    let mut expected: Option<NodeId> = None;
    let mut group_owner = prf.init_id;
    let mut group_recv: Option<NodeId> = None;

    while i < steps.len() {
        let owner = steps[i].author().ok_or(ValidationError::EmptyProof)?;
        // Custody chain: each group's author is the previous spend's recipient.
        if let Some(exp) = expected {
            if owner != exp {
                return Err(ValidationError::ProofMalformed(prf.value));
            }
        }

        let mut count = 0u32;
        let mut recv: Option<NodeId> = None;
        while i < steps.len() && steps[i].author() == Some(owner) {
            let step = &steps[i];
            let abs = check_abstract(ac, prev_h, step.height, owner, step)?;
            prev_h = step.height;

            let mut masked: Option<&[Transaction]> = None;
            let mut set_rejected = false;
            if let Some(block) = cc.covering(step.height) {
                match block.verdict(&abs) {
                    Some(InfVerdict::Rejected) => set_rejected = true,
                    Some(InfVerdict::FailedSubset(_)) => masked = block.failed_subset(&abs),
                    None => {}
                }
            }

            if !set_rejected {
                for tx in &step.txs {
                    let failed = masked.map_or(false, |m| m.iter().any(|f| f.same_transfer(tx)));
                    if tx.value == prf.value && !failed {
                        count += 1;
                        recv = Some(tx.recv);
                    }
                }
            }
            i += 1;
        }

        let is_last = i == steps.len();
        let holder_group = matches!(
            ctx,
            OwnerContext::PreInclusion { author, .. } if is_last && author == owner
        );
        if holder_group {
            // The claimed holder's trailing sets must show no spend at all;
            // one more spend now would be a double spend.
            if count > 0 {
                return Err(ValidationError::DoubleSpent {
                    value: prf.value,
                    count: count + 1,
                });
            }
        } else {
            if count == 0 {
                return Err(ValidationError::NotSpent { value: prf.value });
            }
            if count > 1 {
                return Err(ValidationError::DoubleSpent {
                    value: prf.value,
                    count,
                });
            }
            expected = recv;
        }
        group_owner = owner;
        group_recv = recv;
    }

    trace!(value = prf.value.0, owner = group_owner.0, "proof scan complete");

    match ctx {
        OwnerContext::PreInclusion {
            author,
            horizon,
            own_abs,
        } => {
            let holder = if group_owner == author {
                author
            } else {
                group_recv.unwrap_or(prf.init_id)
            };
            if holder != author {
                return Err(ValidationError::WrongOwner {
                    claimed: author,
                    found: holder,
                });
            }
            // The holder must be fully accounted between the proof's last
            // set and the horizon.
            author_absent(ac, author, prev_h, horizon, own_abs)
        }
        OwnerContext::Receipt { receipt, local } => {
            if group_owner != receipt.sender {
                return Err(ValidationError::WrongOwner {
                    claimed: receipt.sender,
                    found: group_owner,
                });
            }
            match group_recv {
                Some(r) if r == local => Ok(()),
                Some(r) => Err(ValidationError::WrongRecipient {
                    addressed: r,
                    local,
                }),
                None => Err(ValidationError::NotSpent { value: prf.value }),
            }
        }
    }
}

/// Admission check for an inbound transaction-set.
///
/// Recomputes the digest, checks structural validity of every transaction,
/// and runs `get_owner` in pre-inclusion mode over every entry's proof.
/// The whole set is rejected on the first failure.
pub fn verify_inf(
    inf: &TransactionSet,
    ac: &AcChain,
    cc: &CcChain,
) -> Result<(), ValidationError> {
    if inf.entries.is_empty() {
        return Err(ValidationError::InfEmpty);
    }
    if inf.compute_digest() != inf.abs {
        return Err(ValidationError::InfAbs { claimed: inf.abs });
    }
    for entry in &inf.entries {
        if !entry.tx.check() || entry.tx.owner != inf.owner {
            return Err(ValidationError::TxMalformed);
        }
        if entry.proof.value != entry.tx.value {
            return Err(ValidationError::ProofMalformed(entry.proof.value));
        }
        get_owner(
            &entry.proof,
            OwnerContext::PreInclusion {
                author: inf.owner,
                horizon: ac.tip_height(),
                own_abs: Some(inf.abs),
            },
            ac,
            cc,
        )?;
    }
    Ok(())
}
