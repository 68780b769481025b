//! The consolidation-round state machine.
//!
//! Runs once per epoch inside the committee (the producers of the epoch's
//! AC blocks). Phases:
//!
//! ```text
//! IDLE → INIT → γ₁ exchange → γ₂ propose → γ₃ appeal → γ₄ finalize → IDLE
//! ```
//!
//! with view-change edges γ₂→γ₂ and γ₄→γ₄ on leader timeout. Messages
//! arriving outside the round (or addressed to the wrong phase) are
//! silently dropped.

use crate::config::CcConfig;
use crate::sig_set::SignatureSet;
use ezchain_core::{
    Action, ErrorKind, GammaPhase, IdGen, OutboundMessage, ThresholdVerifier, TimerId,
};
use ezchain_types::{
    AcChain, Appeal, BlockHeight, CcBlock, CcChain, CommitteeSig, Hash, InfExchange, NodeId,
    SigPhase, TransactionSet,
};
use ezchain_validation::{get_owner, OwnerContext};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Height of the block sealing `abs` within `(lo, hi]`, if any.
fn sealed_height(
    ac: &AcChain,
    lo_exclusive: BlockHeight,
    hi_inclusive: BlockHeight,
    abs: &Hash,
) -> Option<BlockHeight> {
    ac.range(lo_exclusive, hi_inclusive)
        .find(|block| block.lists(abs))
        .map(|block| block.height)
}

/// Everything the node hands the engine at the epoch boundary.
#[derive(Debug, Clone)]
pub struct EpochSnapshot {
    /// Producers of the epoch's AC blocks.
    pub committee: BTreeSet<NodeId>,
    /// Number of AC blocks produced during the epoch.
    pub block_epoch: u64,
    /// Every transaction-set this node accepted during the epoch.
    pub infs: Vec<TransactionSet>,
    /// The node's AC tip height at the boundary.
    pub acb_height: BlockHeight,
}

/// Phase of the consolidation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcPhase {
    Idle,
    /// γ₁: exchanging accumulated transaction-sets.
    Exchange,
    /// γ₂: waiting for (or collecting signatures over) the leader draft.
    Propose,
    /// γ₃: appeal window after the network-wide notice.
    Appeal,
    /// γ₄: waiting for the finalized block.
    Finalize,
}

/// Structural failures that abort the node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    /// Leader election walked off the AC chain: no block at the required
    /// epoch offset.
    #[error("no AC block at epoch offset {0}")]
    MissingEpochBlock(u64),
}

/// Committee-side state machine for one consolidation round.
pub struct CcState {
    id: NodeId,
    config: CcConfig,
    verifier: Arc<dyn ThresholdVerifier>,
    block_ids: IdGen,

    phase: CcPhase,
    in_cc: bool,
    committee: BTreeSet<NodeId>,
    leader: Option<NodeId>,
    /// View-change counter; selects the leader within the epoch's producers.
    view_cnt: u64,
    draft: Option<CcBlock>,
    /// Digests seen during γ₁ (own and exchanged).
    abs_set: BTreeSet<Hash>,
    sig_set: SignatureSet,
    /// AC height covered by the previous CC block.
    prev_acb_height: BlockHeight,
    /// The gamma timer currently armed, if any.
    armed_gamma: Option<GammaPhase>,
    /// Communication units spent on CC messages (for the CCPT statistic).
    comm_cost: u128,
}

impl CcState {
    pub fn new(
        id: NodeId,
        config: CcConfig,
        verifier: Arc<dyn ThresholdVerifier>,
        block_ids: IdGen,
    ) -> Self {
        Self {
            id,
            config,
            verifier,
            block_ids,
            phase: CcPhase::Idle,
            in_cc: false,
            committee: BTreeSet::new(),
            leader: None,
            view_cnt: 0,
            draft: None,
            abs_set: BTreeSet::new(),
            sig_set: SignatureSet::new(),
            prev_acb_height: BlockHeight::GENESIS,
            armed_gamma: None,
            comm_cost: 0,
        }
    }

    pub fn in_cc(&self) -> bool {
        self.in_cc
    }

    pub fn phase(&self) -> CcPhase {
        self.phase
    }

    pub fn leader(&self) -> Option<NodeId> {
        self.leader
    }

    pub fn draft(&self) -> Option<&CcBlock> {
        self.draft.as_ref()
    }

    pub fn comm_cost(&self) -> u128 {
        self.comm_cost
    }

    /// Committee snapshot of the round in progress.
    pub fn committee(&self) -> &BTreeSet<NodeId> {
        &self.committee
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INIT + γ₁
    // ═══════════════════════════════════════════════════════════════════════

    /// Start the round at the epoch boundary.
    ///
    /// Initializes the draft CC block, elects the round's first leader,
    /// broadcasts this member's accumulated sets and arms γ₁.
    pub fn start_epoch(
        &mut self,
        snapshot: EpochSnapshot,
        ac: &AcChain,
        cc: &CcChain,
        now: Duration,
    ) -> Vec<Action> {
        self.in_cc = true;
        self.phase = CcPhase::Exchange;
        self.committee = snapshot.committee;
        self.view_cnt = 0;
        self.abs_set.clear();
        self.sig_set.clear();
        self.prev_acb_height = cc.tip().map(|b| b.acb_height).unwrap_or(BlockHeight::GENESIS);

        let height = cc.next_height();
        let prev_id = cc.tip().map(|b| b.id).unwrap_or(0);
        let draft = CcBlock::new(
            height,
            self.block_ids.next(),
            prev_id,
            self.id,
            snapshot.acb_height,
            snapshot.block_epoch,
            now.as_millis() as u64,
        );
        self.draft = Some(draft);

        match self.get_leader(0, ac) {
            Ok(leader) => self.leader = Some(leader),
            Err(e) => {
                warn!(node = self.id.0, error = %e, "leader election failed at epoch start");
                return vec![
                    Action::RecordError {
                        kind: ErrorKind::AccHeight,
                    },
                    Action::Abort {
                        kind: ErrorKind::AccHeight,
                    },
                ];
            }
        }

        // Our own sets count as seen.
        for inf in &snapshot.infs {
            self.abs_set.insert(inf.abs);
        }

        let total_txs: usize = snapshot.infs.iter().map(|inf| inf.len()).sum();
        self.comm_cost += (self.committee.len() as u128) * (total_txs as u128);

        info!(
            node = self.id.0,
            height = height.0,
            acb_height = snapshot.acb_height.0,
            committee = self.committee.len(),
            leader = self.leader.map(|l| l.0),
            "starting consolidation round"
        );

        let exchange = InfExchange {
            producer: self.id,
            cc_height: height,
            acb_height: snapshot.acb_height,
            block_epoch: snapshot.block_epoch,
            infs: snapshot.infs,
        };
        let mut actions = vec![Action::Broadcast {
            message: OutboundMessage::InfExchange(exchange),
        }];
        actions.extend(self.arm_gamma(GammaPhase::One, self.config.gamma_1));
        actions
    }

    /// γ₁: a committee peer's accumulated sets.
    ///
    /// Records every digest as seen and re-validates the transactions
    /// inside; failures become subset verdicts in the local draft.
    pub fn on_exchange(&mut self, exchange: &InfExchange, ac: &AcChain, cc: &CcChain) -> Vec<Action> {
        if !self.in_cc || self.phase != CcPhase::Exchange {
            return Vec::new();
        }
        let window_hi = self
            .draft
            .as_ref()
            .map(|d| d.acb_height)
            .unwrap_or(BlockHeight::GENESIS);
        for inf in &exchange.infs {
            let abs = inf.compute_digest();
            self.abs_set.insert(abs);

            // Only chain-listed sets need a verdict; validate each as of
            // the height just before its sealing block.
            let Some(sealed_at) = sealed_height(ac, self.prev_acb_height, window_hi, &abs) else {
                continue;
            };
            let horizon = BlockHeight(sealed_at.0.saturating_sub(1));

            let mut failed = Vec::new();
            for entry in &inf.entries {
                let valid = entry.tx.check()
                    && get_owner(
                        &entry.proof,
                        OwnerContext::PreInclusion {
                            author: inf.owner,
                            horizon,
                            own_abs: None,
                        },
                        ac,
                        cc,
                    )
                    .is_ok();
                if !valid {
                    failed.push(entry.tx.clone());
                }
            }
            if !failed.is_empty() {
                trace!(
                    node = self.id.0,
                    abs = %abs,
                    failed = failed.len(),
                    "exchange re-validation failures"
                );
                if let Some(draft) = self.draft.as_mut() {
                    draft.mark_failed(abs, failed);
                }
            }
        }
        Vec::new()
    }

    /// γ₁ elapsed: mark never-seen digests, then move to the proposal phase.
    pub fn on_gamma1(&mut self, ac: &AcChain) -> Vec<Action> {
        if !self.in_cc || self.phase != CcPhase::Exchange {
            return Vec::new();
        }
        let mut actions = Vec::new();

        let Some(draft) = self.draft.as_mut() else {
            return actions;
        };
        // Any digest the AC chain lists in the covered window that no
        // committee member produced evidence for is rejected outright.
        if self.prev_acb_height < draft.acb_height
            && ac.get(self.prev_acb_height.next()).is_none()
            && self.prev_acb_height > BlockHeight::GENESIS
        {
            actions.push(Action::RecordError {
                kind: ErrorKind::AccBegin,
            });
        }
        let mut missing = 0usize;
        for block in ac.range(self.prev_acb_height, draft.acb_height) {
            if block.producer == self.id {
                continue;
            }
            for abs in &block.abs_list {
                if !self.abs_set.contains(abs) {
                    draft.mark_rejected(*abs);
                    missing += 1;
                }
            }
        }
        if missing > 0 {
            debug!(node = self.id.0, missing, "sets listed on AC but never seen");
        }

        self.phase = CcPhase::Propose;
        if self.leader == Some(self.id) {
            actions.extend(self.broadcast_proposal());
        } else {
            actions.extend(self.arm_gamma(GammaPhase::Two, self.config.gamma_2));
        }
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════
    // γ₂: proposal and signatures
    // ═══════════════════════════════════════════════════════════════════════

    fn broadcast_proposal(&mut self) -> Vec<Action> {
        let Some(draft) = self.draft.as_ref() else {
            return Vec::new();
        };
        // The leader's own signature counts towards the threshold.
        self.sig_set.clear();
        self.sig_set.insert(CommitteeSig {
            ccb_id: draft.id,
            signer: self.id,
            leader: self.id,
            timestamp_ms: draft.timestamp_ms,
            phase: SigPhase::Notice,
        });
        self.comm_cost += (self.committee.len() as u128) * (draft.txn_cnt.max(1) as u128);
        debug!(node = self.id.0, height = draft.height.0, "broadcasting draft proposal");
        vec![Action::Broadcast {
            message: OutboundMessage::CcProposal(draft.clone()),
        }]
    }

    /// γ₂: the leader's draft arrived. Consistent drafts are signed.
    pub fn on_proposal(&mut self, block: &CcBlock, now: Duration) -> Vec<Action> {
        if !self.in_cc || self.phase != CcPhase::Propose {
            return Vec::new();
        }
        if Some(block.producer) != self.leader {
            return Vec::new();
        }
        let consistent = self
            .draft
            .as_ref()
            .map(|d| d.height == block.height && d.acb_height == block.acb_height)
            .unwrap_or(false);
        if !consistent {
            debug!(node = self.id.0, "draft inconsistent with proposal, withholding signature");
            return Vec::new();
        }
        self.sign(block, SigPhase::Notice, now)
    }

    fn sign(&mut self, block: &CcBlock, phase: SigPhase, now: Duration) -> Vec<Action> {
        let Some(leader) = self.leader else {
            return Vec::new();
        };
        let sig = CommitteeSig {
            ccb_id: block.id,
            signer: self.id,
            leader,
            timestamp_ms: now.as_millis() as u64,
            phase,
        };
        self.comm_cost += 1;
        vec![Action::Send {
            to: leader,
            message: OutboundMessage::Signature(sig),
        }]
    }

    /// Leader side: collect signatures; on threshold, release the next
    /// stage (network notice after γ₂, final block after γ₄).
    pub fn on_signature(&mut self, sig: &CommitteeSig) -> Vec<Action> {
        if !self.in_cc || self.leader != Some(self.id) || sig.leader != self.id {
            return Vec::new();
        }
        if !matches!(self.phase, CcPhase::Propose | CcPhase::Finalize) {
            return Vec::new();
        }
        if !self.sig_set.insert(sig.clone()) {
            return Vec::new();
        }
        let quorum = self.sig_set.len() > self.committee.len() / 2
            && self.verifier.verify(self.sig_set.sigs(), &self.committee);
        if !quorum {
            return Vec::new();
        }
        let Some(draft) = self.draft.as_ref() else {
            return Vec::new();
        };
        self.comm_cost += (self.committee.len() as u128) * (draft.txn_cnt.max(1) as u128);
        match self.phase {
            CcPhase::Propose => {
                info!(
                    node = self.id.0,
                    height = draft.height.0,
                    sigs = self.sig_set.len(),
                    "draft signed, broadcasting notice"
                );
                self.phase = CcPhase::Appeal;
                let mut actions = vec![Action::Broadcast {
                    message: OutboundMessage::CcNotice(draft.clone()),
                }];
                actions.extend(self.arm_gamma(GammaPhase::Three, self.config.gamma_3));
                actions
            }
            CcPhase::Finalize => {
                info!(
                    node = self.id.0,
                    height = draft.height.0,
                    sigs = self.sig_set.len(),
                    "amended block signed, broadcasting final"
                );
                // Await our own copy of the final broadcast like everyone else.
                self.phase = CcPhase::Idle;
                vec![Action::Broadcast {
                    message: OutboundMessage::CcFinal {
                        block: draft.clone(),
                        sigs: self.sig_set.sigs().to_vec(),
                    },
                }]
            }
            _ => Vec::new(),
        }
    }

    /// γ₂ elapsed without a signed proposal: roll the view forward.
    pub fn on_gamma2(&mut self, ac: &AcChain) -> Vec<Action> {
        if !self.in_cc || self.phase != CcPhase::Propose {
            return Vec::new();
        }
        self.view_cnt += 1;
        match self.get_leader(self.view_cnt, ac) {
            Ok(leader) => self.leader = Some(leader),
            Err(e) => {
                warn!(node = self.id.0, error = %e, "view change ran out of epoch blocks");
                return vec![
                    Action::RecordError {
                        kind: ErrorKind::AccHeight,
                    },
                    Action::Abort {
                        kind: ErrorKind::AccHeight,
                    },
                ];
            }
        }
        debug!(
            node = self.id.0,
            view = self.view_cnt,
            leader = self.leader.map(|l| l.0),
            "gamma2 view change"
        );
        if self.leader == Some(self.id) {
            self.broadcast_proposal()
        } else {
            self.arm_gamma(GammaPhase::Two, self.config.gamma_2)
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // γ₃: notice and appeals
    // ═══════════════════════════════════════════════════════════════════════

    /// The signed proposal reached the whole network. Committee members
    /// open the appeal window.
    pub fn on_notice(&mut self, block: &CcBlock) -> Vec<Action> {
        self.comm_cost += block.txn_cnt.max(1) as u128;
        if !self.in_cc || self.phase != CcPhase::Propose {
            return Vec::new();
        }
        if Some(block.producer) != self.leader {
            return Vec::new();
        }
        self.phase = CcPhase::Appeal;
        self.arm_gamma(GammaPhase::Three, self.config.gamma_3)
    }

    /// γ₃: a node contests a draft verdict with a proof-of-spend.
    ///
    /// The revealed set must hash to the contested digest, be listed in the
    /// covered AC window, and every entry must validate. Success clears the
    /// verdict in the local draft — every member amends its own copy, so any
    /// view-change leader holds the amended block.
    pub fn on_appeal(&mut self, appeal: &Appeal, ac: &AcChain, cc: &CcChain) -> Vec<Action> {
        if !self.in_cc || self.phase != CcPhase::Appeal {
            return Vec::new();
        }
        let inf = &appeal.inf;
        let abs = inf.compute_digest();
        if abs != inf.abs || inf.is_empty() {
            return Vec::new();
        }
        let Some(draft) = self.draft.as_ref() else {
            return Vec::new();
        };
        if draft.verdict(&abs).is_none() {
            return Vec::new();
        }
        let Some(sealed_at) = sealed_height(ac, self.prev_acb_height, draft.acb_height, &abs)
        else {
            debug!(node = self.id.0, abs = %abs, "appealed set not in covered window");
            return Vec::new();
        };
        let horizon = BlockHeight(sealed_at.0.saturating_sub(1));
        let all_valid = inf.entries.iter().all(|entry| {
            entry.tx.check()
                && get_owner(
                    &entry.proof,
                    OwnerContext::PreInclusion {
                        author: inf.owner,
                        horizon,
                        own_abs: None,
                    },
                    ac,
                    cc,
                )
                .is_ok()
        });
        if all_valid {
            info!(node = self.id.0, abs = %abs, appellant = appeal.appellant.0, "appeal accepted");
            if let Some(draft) = self.draft.as_mut() {
                draft.clear_verdict(&abs);
            }
        }
        Vec::new()
    }

    /// γ₃ elapsed: the appeal window closes; the leader sends the amended
    /// block for re-signing.
    pub fn on_gamma3(&mut self) -> Vec<Action> {
        if !self.in_cc || self.phase != CcPhase::Appeal {
            return Vec::new();
        }
        self.phase = CcPhase::Finalize;
        self.sig_set.clear();
        if self.leader == Some(self.id) {
            let Some(draft) = self.draft.as_ref() else {
                return Vec::new();
            };
            // Re-seed with the leader's own final-phase signature.
            self.sig_set.insert(CommitteeSig {
                ccb_id: draft.id,
                signer: self.id,
                leader: self.id,
                timestamp_ms: draft.timestamp_ms,
                phase: SigPhase::Final,
            });
            self.comm_cost += (self.committee.len() as u128) * (draft.txn_cnt.max(1) as u128);
            vec![Action::Broadcast {
                message: OutboundMessage::CcAmended(draft.clone()),
            }]
        } else {
            self.arm_gamma(GammaPhase::Four, self.config.gamma_4)
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // γ₄: amendment and finalization
    // ═══════════════════════════════════════════════════════════════════════

    /// γ₄: the amended block arrived; committee members re-sign it.
    ///
    /// Accepted from the appeal phase too — the leader's γ₃ runs ahead of
    /// the members', so the amended block can outrun the local transition.
    pub fn on_amended(&mut self, block: &CcBlock, now: Duration) -> Vec<Action> {
        if !self.in_cc || !matches!(self.phase, CcPhase::Appeal | CcPhase::Finalize) {
            return Vec::new();
        }
        if Some(block.producer) != self.leader {
            return Vec::new();
        }
        self.sign(block, SigPhase::Final, now)
    }

    /// γ₄ elapsed without a final block: roll the view forward again.
    pub fn on_gamma4(&mut self, ac: &AcChain) -> Vec<Action> {
        if !self.in_cc || self.phase != CcPhase::Finalize {
            return Vec::new();
        }
        self.view_cnt += 1;
        match self.get_leader(self.view_cnt, ac) {
            Ok(leader) => self.leader = Some(leader),
            Err(e) => {
                warn!(node = self.id.0, error = %e, "gamma4 view change ran out of epoch blocks");
                return vec![
                    Action::RecordError {
                        kind: ErrorKind::AccHeight,
                    },
                    Action::Abort {
                        kind: ErrorKind::AccHeight,
                    },
                ];
            }
        }
        debug!(
            node = self.id.0,
            view = self.view_cnt,
            leader = self.leader.map(|l| l.0),
            "gamma4 view change"
        );
        if self.leader == Some(self.id) {
            let Some(draft) = self.draft.as_ref() else {
                return Vec::new();
            };
            self.sig_set.clear();
            self.sig_set.insert(CommitteeSig {
                ccb_id: draft.id,
                signer: self.id,
                leader: self.id,
                timestamp_ms: draft.timestamp_ms,
                phase: SigPhase::Final,
            });
            vec![Action::Broadcast {
                message: OutboundMessage::CcAmended(draft.clone()),
            }]
        } else {
            self.arm_gamma(GammaPhase::Four, self.config.gamma_4)
        }
    }

    /// Terminal transition back to IDLE: clears the committee snapshot,
    /// digest and signature sets, the leader and the round flag.
    pub fn finish(&mut self) -> Vec<Action> {
        self.phase = CcPhase::Idle;
        self.in_cc = false;
        self.committee.clear();
        self.abs_set.clear();
        self.sig_set.clear();
        self.leader = None;
        self.view_cnt = 0;
        self.draft = None;
        match self.armed_gamma.take() {
            Some(phase) => vec![Action::CancelTimer {
                id: TimerId::Gamma(phase),
            }],
            None => Vec::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Leader election
    // ═══════════════════════════════════════════════════════════════════════

    /// Leader for view `cnt`: the producer of the `(cnt+1)`-th AC block of
    /// the covered epoch. Walks back `block_epoch - 1 - cnt` blocks from
    /// the block at the draft's `acb_height`.
    ///
    /// A missing block at the required offset is an impossible structural
    /// state and aborts the node.
    pub fn get_leader(&self, cnt: u64, ac: &AcChain) -> Result<NodeId, ConsensusError> {
        let draft = self
            .draft
            .as_ref()
            .ok_or(ConsensusError::MissingEpochBlock(cnt))?;
        let back = draft
            .block_epoch
            .checked_sub(1 + cnt)
            .ok_or(ConsensusError::MissingEpochBlock(cnt))?;
        let target = draft
            .acb_height
            .0
            .checked_sub(back)
            .filter(|h| *h >= 1)
            .ok_or(ConsensusError::MissingEpochBlock(cnt))?;
        ac.get(BlockHeight(target))
            .map(|b| b.producer)
            .ok_or(ConsensusError::MissingEpochBlock(cnt))
    }

    /// Arm a gamma timer, cancelling whichever phase timer was armed.
    fn arm_gamma(&mut self, phase: GammaPhase, duration: Duration) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(prev) = self.armed_gamma.take() {
            if prev != phase {
                actions.push(Action::CancelTimer {
                    id: TimerId::Gamma(prev),
                });
            }
        }
        self.armed_gamma = Some(phase);
        actions.push(Action::SetTimer {
            id: TimerId::Gamma(phase),
            duration,
        });
        actions
    }
}
