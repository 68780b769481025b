//! Unit scenarios for the `get_owner` predicate.
//!
//! Chains are built by hand: blocks are appended in order with the digests
//! under test, and proofs are assembled step by step.

use ezchain_types::{
    digest_of_txs, AcBlock, AcChain, BlockHeight, CcBlock, CcChain, InfEntry, NodeId, Proof,
    Receipt, Transaction, TransactionSet, TxId, ValueId,
};
use ezchain_validation::{get_owner, verify_inf, OwnerContext, ValidationError};

fn tx(id: u64, val: u64, owner: u64, recv: u64, h: u64) -> Transaction {
    let mut t = Transaction::new(TxId(id), ValueId(val), NodeId(owner), NodeId(recv));
    t.acb_height = BlockHeight(h);
    t
}

/// Append a block at the chain tip listing the given sets' digests.
fn push_block(ac: &mut AcChain, producer: u64, sets: &[&[Transaction]]) -> BlockHeight {
    let height = ac.tip_height().next();
    let mut block = AcBlock::new(height, height.0, height.0.saturating_sub(1), NodeId(producer), 0);
    for set in sets {
        block.abs_list.push(digest_of_txs(set.iter()));
        if let Some(first) = set.first() {
            block.node_filter.insert(first.owner);
        }
    }
    assert!(ac.append(block));
    height
}

fn receipt_for(proof: &Proof, sender: u64, recv: u64, tx_idx: usize) -> Receipt {
    let last = proof.steps().last().expect("proof has a sealed set");
    Receipt {
        sender: NodeId(sender),
        recv: NodeId(recv),
        height: last.height,
        tx_idx,
        txs: last.txs.clone(),
        proof: proof.clone(),
    }
}

#[test]
fn genesis_transfer_accepted() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();

    // Node 0 transfers value 7 to node 1 in a set sealed at height 1.
    let set = vec![tx(1, 7, 0, 1, 1)];
    let h = push_block(&mut ac, 0, &[&set]);

    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(set, h);

    let receipt = receipt_for(&proof, 0, 1, 0);
    get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(1),
        },
        &ac,
        &cc,
    )
    .expect("genesis transfer validates");
}

#[test]
fn receipt_for_wrong_recipient_rejected() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();
    let set = vec![tx(1, 7, 0, 1, 1)];
    let h = push_block(&mut ac, 0, &[&set]);
    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(set, h);
    let receipt = receipt_for(&proof, 0, 1, 0);

    let err = get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(2),
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::WrongRecipient { .. }));
}

#[test]
fn forged_genesis_owner_rejected() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();
    // Node 2 forges a transfer of a value whose genesis owner is node 0.
    let set = vec![tx(1, 7, 2, 1, 1)];
    let h = push_block(&mut ac, 2, &[&set]);
    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(set, h);
    let receipt = receipt_for(&proof, 2, 1, 0);

    let err = get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(1),
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::BadGenesis { .. }));
}

#[test]
fn continuity_violation_rejected() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();

    // Node 0 publishes a set at height 1 that the proof omits, then the
    // "real" transfer at height 3.
    let hidden = vec![tx(1, 9, 0, 2, 1)];
    push_block(&mut ac, 0, &[&hidden]);
    push_block(&mut ac, 1, &[]);
    let transfer = vec![tx(2, 7, 0, 1, 3)];
    let h = push_block(&mut ac, 0, &[&transfer]);

    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(transfer, h);
    let receipt = receipt_for(&proof, 0, 1, 0);

    let err = get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(1),
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::Incomplete { .. }));
}

#[test]
fn continuity_requires_listed_digest() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();
    // The chain has a block at height 1, but it lists nothing.
    push_block(&mut ac, 0, &[]);
    let set = vec![tx(1, 7, 0, 1, 1)];
    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(set, BlockHeight(1));
    let receipt = receipt_for(&proof, 0, 1, 0);

    let err = get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(1),
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::Incomplete { .. }));
}

#[test]
fn double_spend_in_group_rejected() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();

    // Node 0 spends value 7 twice across two of its own sets.
    let first = vec![tx(1, 7, 0, 1, 1)];
    push_block(&mut ac, 0, &[&first]);
    let second = vec![tx(2, 7, 0, 2, 2)];
    let h2 = push_block(&mut ac, 0, &[&second]);

    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(first, BlockHeight(1));
    proof.push_step(second, h2);
    let receipt = receipt_for(&proof, 0, 2, 0);

    let err = get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(2),
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::DoubleSpent { count: 2, .. }));
}

#[test]
fn cc_rejected_set_is_skipped() {
    let mut ac = AcChain::new();

    let set = vec![tx(1, 7, 0, 1, 1)];
    let h = push_block(&mut ac, 0, &[&set]);
    let abs = digest_of_txs(set.iter());

    // A CC round covering height 1 rejected the whole set.
    let mut cc = CcChain::new();
    let mut ccb = CcBlock::new(BlockHeight(0), 1, 0, NodeId(0), BlockHeight(2), 1, 0);
    ccb.mark_rejected(abs);
    assert!(cc.append(ccb));
    push_block(&mut ac, 1, &[]);

    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(set, h);
    let receipt = receipt_for(&proof, 0, 1, 0);

    // The only spend of value 7 never happened, so the group has none.
    let err = get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(1),
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::NotSpent { .. }));
}

#[test]
fn cc_masked_transaction_is_ignored() {
    let mut ac = AcChain::new();

    // One set carries a legitimate spend of value 7 and a bad spend of
    // value 8; CC masked only the bad transaction.
    let good = tx(1, 7, 0, 1, 1);
    let bad = tx(2, 8, 0, 1, 1);
    let set = vec![good.clone(), bad.clone()];
    let h = push_block(&mut ac, 0, &[&set]);
    let abs = digest_of_txs(set.iter());

    let mut cc = CcChain::new();
    let mut ccb = CcBlock::new(BlockHeight(0), 1, 0, NodeId(0), BlockHeight(2), 1, 0);
    ccb.mark_failed(abs, vec![bad]);
    assert!(cc.append(ccb));
    push_block(&mut ac, 1, &[]);

    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(set, h);
    let receipt = receipt_for(&proof, 0, 1, 0);

    get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(1),
        },
        &ac,
        &cc,
    )
    .expect("unmasked spend still validates");
}

#[test]
fn pre_inclusion_accepts_current_holder() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();

    // 0 → 1 at height 1; node 1 then publishes an unrelated set at height 2.
    let transfer = vec![tx(1, 7, 0, 1, 1)];
    push_block(&mut ac, 0, &[&transfer]);
    let own = vec![tx(2, 9, 1, 2, 2)];
    let h2 = push_block(&mut ac, 1, &[&own]);

    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(transfer, BlockHeight(1));
    proof.push_step(own, h2);

    get_owner(
        &proof,
        OwnerContext::PreInclusion {
            author: NodeId(1),
            horizon: ac.tip_height(),
            own_abs: None,
        },
        &ac,
        &cc,
    )
    .expect("holder's trailing sets show no spend");

    // Node 2 cannot claim the value with the same proof: node 1's trailing
    // set is not exempt for it, and contains no spend of value 7.
    let err = get_owner(
        &proof,
        OwnerContext::PreInclusion {
            author: NodeId(2),
            horizon: ac.tip_height(),
            own_abs: None,
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::NotSpent { .. }));
}

#[test]
fn pre_inclusion_rejects_spent_value() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();

    // Node 1 already spent value 7 at height 2; claiming to still hold it
    // is a double spend.
    let transfer = vec![tx(1, 7, 0, 1, 1)];
    push_block(&mut ac, 0, &[&transfer]);
    let spend = vec![tx(2, 7, 1, 2, 2)];
    let h2 = push_block(&mut ac, 1, &[&spend]);

    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(transfer, BlockHeight(1));
    proof.push_step(spend, h2);

    let err = get_owner(
        &proof,
        OwnerContext::PreInclusion {
            author: NodeId(1),
            horizon: ac.tip_height(),
            own_abs: None,
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::DoubleSpent { .. }));
}

#[test]
fn fresh_genesis_value_pre_inclusion() {
    let ac = AcChain::new();
    let cc = CcChain::new();
    let proof = Proof::new(NodeId(3), ValueId(5), BlockHeight::GENESIS);

    get_owner(
        &proof,
        OwnerContext::PreInclusion {
            author: NodeId(3),
            horizon: ac.tip_height(),
            own_abs: None,
        },
        &ac,
        &cc,
    )
    .expect("genesis owner holds an untransferred value");
    let err = get_owner(
        &proof,
        OwnerContext::PreInclusion {
            author: NodeId(4),
            horizon: ac.tip_height(),
            own_abs: None,
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::WrongOwner { .. }));
}

#[test]
fn stale_proof_omitting_prior_spend_rejected() {
    // Double-spend via omission: node 0 transferred value 7 at height 1,
    // then "transfers" it again at height 2 with a proof that starts fresh.
    let mut ac = AcChain::new();
    let cc = CcChain::new();

    let first = vec![tx(1, 7, 0, 1, 1)];
    push_block(&mut ac, 0, &[&first]);
    let second = vec![tx(2, 7, 0, 2, 2)];
    let h2 = push_block(&mut ac, 0, &[&second]);

    let mut forged = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    forged.push_step(second, h2);
    let receipt = receipt_for(&forged, 0, 2, 0);

    // Continuity runs from the genesis height: the block at height 1
    // carries node 0's unaccounted set.
    let err = get_owner(
        &forged,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(2),
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::Incomplete {
            height: BlockHeight(1),
            ..
        }
    ));
}

#[test]
fn empty_proof_with_published_history_rejected() {
    // Node 0 already has a set on chain; claiming a value with a bare
    // genesis proof hides that history.
    let mut ac = AcChain::new();
    let cc = CcChain::new();
    let published = vec![tx(1, 9, 0, 1, 1)];
    push_block(&mut ac, 0, &[&published]);

    let proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    let err = get_owner(
        &proof,
        OwnerContext::PreInclusion {
            author: NodeId(0),
            horizon: ac.tip_height(),
            own_abs: None,
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::Incomplete { .. }));
}

#[test]
fn verify_inf_digest_mismatch_rejected() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();
    push_block(&mut ac, 0, &[]);

    let proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    let mut inf = TransactionSet::seal(
        NodeId(0),
        vec![InfEntry {
            tx: tx(1, 7, 0, 1, 0),
            proof,
        }],
    );
    // Tamper with the contents after sealing.
    inf.entries[0].tx.recv = NodeId(2);

    let err = verify_inf(&inf, &ac, &cc).unwrap_err();
    assert!(matches!(err, ValidationError::InfAbs { .. }));
}

#[test]
fn verify_inf_accepts_genesis_spend() {
    let ac = AcChain::new();
    let cc = CcChain::new();
    let proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    let inf = TransactionSet::seal(
        NodeId(0),
        vec![InfEntry {
            tx: tx(1, 7, 0, 1, 0),
            proof,
        }],
    );
    verify_inf(&inf, &ac, &cc).expect("first spend of a genesis value");
}

#[test]
fn custody_chain_break_rejected() {
    let mut ac = AcChain::new();
    let cc = CcChain::new();

    // 0 → 1, but the next group is authored by 2 (never the recipient).
    let first = vec![tx(1, 7, 0, 1, 1)];
    push_block(&mut ac, 0, &[&first]);
    let second = vec![tx(2, 7, 2, 3, 2)];
    let h2 = push_block(&mut ac, 2, &[&second]);

    let mut proof = Proof::new(NodeId(0), ValueId(7), BlockHeight::GENESIS);
    proof.push_step(first, BlockHeight(1));
    proof.push_step(second, h2);
    let receipt = receipt_for(&proof, 2, 3, 0);

    let err = get_owner(
        &proof,
        OwnerContext::Receipt {
            receipt: &receipt,
            local: NodeId(3),
        },
        &ac,
        &cc,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::ProofMalformed(_)));
}
