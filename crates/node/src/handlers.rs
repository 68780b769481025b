//! Event handlers for the node state machine.

use crate::state::NodeStateMachine;
use ezchain_consensus::EpochSnapshot;
use ezchain_core::{
    sampling, Action, ErrorKind, GammaPhase, OutboundMessage, TimerId,
};
use ezchain_store::Namespace;
use ezchain_types::{
    AcBlock, BlockHeight, CcBlock, CommitteeSig, InfEntry, InfVerdict, NodeId, PersonalBlock,
    Proof, Receipt, Transaction, TransactionSet, TxId,
};
use ezchain_validation::{get_owner, verify_inf, OwnerContext};
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, info, trace, warn};

impl NodeStateMachine {
    // ═══════════════════════════════════════════════════════════════════════
    // Transaction generation and staging
    // ═══════════════════════════════════════════════════════════════════════

    /// Mint one transaction against a uniformly chosen held Value and
    /// stage it; seal the pool when the staging rule allows.
    pub(crate) fn on_tx_timer(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();

        if !self.holdings.is_empty() {
            let pos = self.rng.gen_range(0..self.holdings.len());
            let mut proof = self.holdings.remove(pos);
            let value = proof.value;

            let recv = loop {
                let candidate = NodeId(self.rng.gen_range(0..self.config.n));
                if candidate != self.id {
                    break candidate;
                }
            };
            let tx = Transaction::new(TxId(self.tx_ids.next()), value, self.id, recv);

            // Bring the proof up to date before it leaves this node.
            if self.config.use_cc {
                if let Some(tip) = self.cc.tip() {
                    proof.compact(tip.acb_height);
                }
            }
            proof.extend_from_personal(self.personal.blocks());
            self.stats.set_value_txs(value, proof.tx_count() as u64);

            let key = tx.tx_id.to_string();
            let record = format!("{}{}", tx.to_wire(), proof.to_wire());
            match self.store.put(Namespace::Tx, &key, record.into_bytes()) {
                Ok(()) => {
                    trace!(node = self.id.0, value = value.0, recv = recv.0, "minted transaction");
                    self.staging.push(key);
                }
                Err(e) => {
                    warn!(node = self.id.0, error = %e, "blob store write failed, transaction dropped");
                    self.holdings.push(proof);
                }
            }
        }

        if self.staging.in_flight().is_none() {
            actions.extend(self.send_inf());
        }

        let delay = sampling::exponential(&mut self.rng, self.config.tx_interval_mean());
        actions.push(Action::SetTimer {
            id: TimerId::TxGen,
            duration: delay,
        });
        actions
    }

    /// Seal the staged transactions into a set and broadcast it.
    pub(crate) fn send_inf(&mut self) -> Vec<Action> {
        if self.staging.is_empty() {
            return Vec::new();
        }
        let mut entries = Vec::new();
        for key in self.staging.drain() {
            let record = match self.store.get(Namespace::Tx, &key) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    warn!(node = self.id.0, key = %key, "staged transaction missing from store");
                    continue;
                }
                Err(e) => {
                    warn!(node = self.id.0, error = %e, "blob store read failed");
                    continue;
                }
            };
            match parse_tx_record(&record) {
                Ok(entry) => entries.push(entry),
                Err(kind) => {
                    warn!(node = self.id.0, key = %key, "corrupt staged transaction");
                    return vec![Action::RecordError { kind }];
                }
            }
        }
        if entries.is_empty() {
            return Vec::new();
        }

        // Personal blocks sealed since minting must reach the proofs, or
        // continuity validation will see an unaccounted gap.
        for entry in &mut entries {
            entry.proof.extend_from_personal(self.personal.blocks());
        }

        let inf = TransactionSet::seal(self.id, entries);
        self.stats.tx_send_cnt += inf.len() as u64;
        if let Err(e) = self
            .store
            .put(Namespace::Inf, &inf.abs.to_hex(), inf.to_wire().into_bytes())
        {
            warn!(node = self.id.0, error = %e, "blob store write failed for sealed set");
        }
        self.staging.set_in_flight(inf.abs);

        // Our own set is part of what we saw this epoch, and of what our
        // next block packs.
        self.inf_buffer.push(inf.clone());
        self.epoch_infs.push(inf.clone());

        debug!(node = self.id.0, abs = %inf.abs, txs = inf.len(), "sealed and broadcast set");
        vec![Action::Broadcast {
            message: OutboundMessage::Inf(inf),
        }]
    }

    /// A peer's set arrived: admit it into the packing buffer if it
    /// verifies.
    pub(crate) fn on_inf(&mut self, inf: TransactionSet) -> Vec<Action> {
        match verify_inf(&inf, &self.ac, &self.cc) {
            Ok(()) => {
                trace!(node = self.id.0, abs = %inf.abs, owner = inf.owner.0, "set accepted");
                // A set that outran its own sealing block is evidence for
                // the next CC round but must not be packed again.
                if !self.sealed_abs.contains(&inf.abs) {
                    self.inf_buffer.push(inf.clone());
                }
                self.epoch_infs.push(inf);
                Vec::new()
            }
            Err(e) => {
                debug!(node = self.id.0, abs = %inf.abs, error = %e, "set rejected");
                vec![Action::RecordError { kind: e.kind() }]
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mining and AC ingestion
    // ═══════════════════════════════════════════════════════════════════════

    /// The mining race fired: produce an AC block from the verified buffer.
    pub(crate) fn on_mining_timer(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();

        let height = self.tip_height.next();
        let mut block = AcBlock::new(
            height,
            self.block_ids.next(),
            self.tip_id,
            self.id,
            self.now.as_millis() as u64,
        );

        if self.inf_buffer.is_empty() {
            actions.push(Action::RecordError {
                kind: ErrorKind::InfEmpty,
            });
        }
        let mut packed: Vec<TransactionSet> = self.inf_buffer.drain(..).collect();
        for inf in &mut packed {
            inf.height = height;
            block.abs_list.push(inf.abs);
            block.node_filter.insert(inf.owner);
            self.sealed_abs.insert(inf.abs);
        }
        self.stats.abs_cnt += block.node_filter.len() as u64;

        self.ac.append(block.clone());
        self.tip_id = block.id;
        self.tip_height = block.height;

        if !self.in_committee {
            self.in_committee = true;
            self.committee.insert(self.id);
        }
        if self.leader_hint.is_none() {
            self.leader_hint = Some(self.id);
        }
        self.block_epoch += 1;

        info!(
            node = self.id.0,
            height = height.0,
            sets = packed.len(),
            "produced AC block"
        );
        actions.push(Action::Broadcast {
            message: OutboundMessage::AcBlock(block.clone()),
        });

        // Author-side bookkeeping for our own set, then producer duty:
        // receipts for every transaction we packed.
        self.absorb_own_sets(&block, &mut actions);
        self.dispatch_receipts(&block, &packed, &mut actions);

        if !self.staging.is_empty() && self.staging.in_flight().is_none() {
            actions.extend(self.send_inf());
        }

        let delay = sampling::exponential(&mut self.rng, self.config.mining_mean());
        actions.push(Action::SetTimer {
            id: TimerId::Mining,
            duration: delay,
        });
        actions
    }

    /// A peer's AC block arrived.
    pub(crate) fn on_ac_block(&mut self, block: AcBlock) -> Vec<Action> {
        let mut actions = Vec::new();

        if block.height <= self.tip_height {
            // Lost the producer race at this height; first block wins.
            debug!(node = self.id.0, height = block.height.0, "stale AC block dropped");
            return actions;
        }
        if block.height != self.tip_height.next() {
            warn!(node = self.id.0, height = block.height.0, tip = self.tip_height.0, "AC height gap");
            return vec![Action::RecordError {
                kind: ErrorKind::AccHeight,
            }];
        }

        self.ac.append(block.clone());
        self.tip_id = block.id;
        self.tip_height = block.height;

        self.committee.insert(block.producer);
        if self.leader_hint.is_none() {
            self.leader_hint = Some(block.producer);
        }
        self.block_epoch += 1;

        self.sealed_abs.extend(block.abs_list.iter().copied());
        self.absorb_own_sets(&block, &mut actions);

        // Sets the producer packed are on chain now; stop holding them for
        // our own next block.
        self.inf_buffer.retain(|inf| !block.lists(&inf.abs));

        if !self.staging.is_empty() && self.staging.in_flight().is_none() {
            actions.extend(self.send_inf());
        }

        actions.push(Action::CancelTimer {
            id: TimerId::Mining,
        });
        let delay = sampling::exponential(&mut self.rng, self.config.mining_mean());
        actions.push(Action::SetTimer {
            id: TimerId::Mining,
            duration: delay,
        });
        actions
    }

    /// If the block seals our in-flight set, append it to the personal
    /// chain.
    fn absorb_own_sets(&mut self, block: &AcBlock, actions: &mut Vec<Action>) {
        let Some(abs) = self.staging.in_flight() else {
            return;
        };
        if !block.lists(&abs) {
            return;
        }
        let inf = match self.store.get(Namespace::Inf, &abs.to_hex()) {
            Ok(Some(bytes)) => match std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| TransactionSet::from_wire(s).ok())
            {
                Some(inf) => inf,
                None => {
                    warn!(node = self.id.0, abs = %abs, "corrupt sealed set in store");
                    actions.push(Action::RecordError {
                        kind: ErrorKind::InfAbs,
                    });
                    return;
                }
            },
            Ok(None) => {
                warn!(node = self.id.0, abs = %abs, "sealed set missing from store");
                return;
            }
            Err(e) => {
                warn!(node = self.id.0, error = %e, "blob store read failed");
                return;
            }
        };

        let txs: Vec<Transaction> = inf
            .txs()
            .cloned()
            .map(|mut tx| {
                tx.acb_height = block.height;
                tx
            })
            .collect();
        if txs.is_empty() {
            actions.push(Action::RecordError {
                kind: ErrorKind::EmptyPrf,
            });
        }
        let prfs: Vec<Proof> = inf.entries.iter().map(|e| e.proof.clone()).collect();

        let personal = PersonalBlock {
            height: block.height,
            txs,
            prfs,
            digest: abs,
        };
        let key = format!("{} {}", self.id, self.personal.len());
        if let Err(e) = self
            .store
            .put(Namespace::Pb, &key, personal.to_wire().into_bytes())
        {
            warn!(node = self.id.0, error = %e, "blob store write failed for personal block");
        }
        debug!(node = self.id.0, height = block.height.0, abs = %abs, "own set sealed");
        self.personal.append(personal);
        self.staging.confirm(&abs);
    }

    /// Producer duty: notify the recipient of every packed transaction,
    /// shipping the proof extended with the freshly sealed set.
    fn dispatch_receipts(
        &mut self,
        block: &AcBlock,
        packed: &[TransactionSet],
        actions: &mut Vec<Action>,
    ) {
        for inf in packed {
            let sealed_txs: Vec<Transaction> = inf
                .txs()
                .cloned()
                .map(|mut tx| {
                    tx.acb_height = block.height;
                    tx
                })
                .collect();

            for (idx, entry) in inf.entries.iter().enumerate() {
                let mut proof = entry.proof.clone();
                if self.config.use_cc {
                    if let Some(tip) = self.cc.tip() {
                        proof.compact(tip.acb_height);
                    }
                }
                proof.push_step(sealed_txs.clone(), block.height);
                self.stats.add_comm(proof.tx_count() as u128);

                let receipt = Receipt {
                    sender: inf.owner,
                    recv: sealed_txs[idx].recv,
                    height: block.height,
                    tx_idx: idx,
                    txs: sealed_txs.clone(),
                    proof,
                };
                actions.push(Action::Send {
                    to: receipt.recv,
                    message: OutboundMessage::Receipt(receipt),
                });
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Receipts
    // ═══════════════════════════════════════════════════════════════════════

    /// A transfer addressed to us reached the chain: validate the proof
    /// and adopt the Value.
    pub(crate) fn on_receipt(&mut self, receipt: Receipt) -> Vec<Action> {
        let ctx = OwnerContext::Receipt {
            receipt: &receipt,
            local: self.id,
        };
        match get_owner(&receipt.proof, ctx, &self.ac, &self.cc) {
            Ok(()) => {
                let proof = receipt.proof;
                if self.holdings.iter().any(|p| p.value == proof.value) {
                    debug!(node = self.id.0, value = proof.value.0, "duplicate receipt dropped");
                    return Vec::new();
                }
                info!(
                    node = self.id.0,
                    value = proof.value.0,
                    from = receipt.sender.0,
                    height = receipt.height.0,
                    "value adopted"
                );
                self.stats.set_value_txs(proof.value, proof.tx_count() as u64);
                if let Err(e) = self.store.put(
                    Namespace::Prf,
                    &proof.value.to_string(),
                    proof.to_wire().into_bytes(),
                ) {
                    warn!(node = self.id.0, error = %e, "blob store write failed for proof");
                }
                self.holdings.push(proof);
                Vec::new()
            }
            Err(e) => {
                debug!(node = self.id.0, error = %e, from = receipt.sender.0, "receipt rejected");
                vec![Action::RecordError { kind: e.kind() }]
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Epoch boundary and the consolidation round
    // ═══════════════════════════════════════════════════════════════════════

    /// Epoch tick: committee members start the CC round; everyone resets
    /// the epoch accumulators and re-arms the timer.
    pub(crate) fn on_epoch_timer(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();

        if self.config.use_cc && self.in_committee {
            let snapshot = EpochSnapshot {
                committee: self.committee.clone(),
                block_epoch: self.block_epoch,
                infs: self.epoch_infs.clone(),
                acb_height: self.tip_height,
            };
            actions.extend(self.consensus.start_epoch(snapshot, &self.ac, &self.cc, self.now));
        }

        self.in_committee = false;
        self.leader_hint = None;
        self.block_epoch = 0;
        self.epoch_infs.clear();

        actions.push(Action::SetTimer {
            id: TimerId::Epoch,
            duration: self.config.epoch,
        });
        actions
    }

    pub(crate) fn on_gamma(&mut self, phase: GammaPhase) -> Vec<Action> {
        match phase {
            GammaPhase::One => self.consensus.on_gamma1(&self.ac),
            GammaPhase::Two => self.consensus.on_gamma2(&self.ac),
            GammaPhase::Three => self.consensus.on_gamma3(),
            GammaPhase::Four => self.consensus.on_gamma4(&self.ac),
        }
    }

    /// The signed proposal reached us. Committee members open the appeal
    /// window; any node whose sets are marked failed may appeal with a
    /// proof-of-spend.
    pub(crate) fn on_cc_notice(&mut self, block: CcBlock) -> Vec<Action> {
        let mut actions = self.consensus.on_notice(&block);
        actions.extend(self.build_appeals(&block));
        actions
    }

    /// Appeals for our own sets the proposal marks failed.
    fn build_appeals(&self, proposal: &CcBlock) -> Vec<Action> {
        let mut actions = Vec::new();
        for (abs, verdict) in &proposal.fail_txs {
            let contested = match verdict {
                InfVerdict::Rejected => true,
                InfVerdict::FailedSubset(i) => proposal
                    .fail_txn
                    .get(*i)
                    .map(|group| group.iter().any(|tx| tx.owner == self.id))
                    .unwrap_or(false),
            };
            if !contested {
                continue;
            }
            let Some(personal) = self.personal.find_by_digest(abs) else {
                continue;
            };
            if personal.prfs.len() != personal.txs.len() {
                continue;
            }
            let entries: Vec<InfEntry> = personal
                .txs
                .iter()
                .zip(personal.prfs.iter())
                .map(|(tx, proof)| InfEntry {
                    tx: tx.clone(),
                    proof: proof.clone(),
                })
                .collect();
            let inf = TransactionSet {
                owner: self.id,
                entries,
                abs: *abs,
                height: personal.height,
            };
            info!(node = self.id.0, abs = %abs, "submitting appeal");
            actions.push(Action::Broadcast {
                message: OutboundMessage::Appeal(ezchain_types::Appeal {
                    appellant: self.id,
                    inf,
                }),
            });
        }
        actions
    }

    /// A finalized CC block arrived: verify, append, compact every held
    /// proof, and close the round.
    pub(crate) fn on_cc_final(&mut self, block: CcBlock, sigs: Vec<CommitteeSig>) -> Vec<Action> {
        if !self.config.use_cc {
            return Vec::new();
        }
        if block.height != self.cc.next_height() {
            // Only one CC block per height is ever accepted.
            debug!(node = self.id.0, height = block.height.0, "duplicate CC block dropped");
            return Vec::new();
        }

        // The committee is chain-derived: the producers of the covered
        // epoch's AC blocks.
        let prev_boundary = self
            .cc
            .tip()
            .map(|b| b.acb_height)
            .unwrap_or(BlockHeight::GENESIS);
        let committee: BTreeSet<NodeId> = self
            .ac
            .range(prev_boundary, block.acb_height)
            .map(|b| b.producer)
            .collect();
        if !self.verifier.verify(&sigs, &committee) {
            warn!(node = self.id.0, height = block.height.0, "CC block threshold check failed");
            return Vec::new();
        }

        info!(
            node = self.id.0,
            height = block.height.0,
            acb_height = block.acb_height.0,
            rejected = block.fail_txs.len(),
            "CC block accepted"
        );
        let boundary = block.acb_height;
        self.cc.append(block);

        let mut actions = Vec::new();
        for proof in &mut self.holdings {
            let removed = proof.compact(boundary);
            let anchored = proof
                .first_height()
                .map(|h| h <= boundary)
                .unwrap_or(true);
            if removed > 0 && !anchored {
                actions.push(Action::RecordError {
                    kind: ErrorKind::AfterCc,
                });
            }
        }

        actions.extend(self.consensus.finish());
        self.committee.clear();
        actions
    }
}

/// Parse a stored transaction record: the transaction wire form followed by
/// its proof.
fn parse_tx_record(bytes: &[u8]) -> Result<InfEntry, ErrorKind> {
    let s = std::str::from_utf8(bytes).map_err(|_| ErrorKind::TxType)?;
    let split = s.find(';').ok_or(ErrorKind::TxType)?;
    let tx = Transaction::from_wire(&s[..=split]).map_err(|_| ErrorKind::TxType)?;
    let proof = Proof::from_wire(&s[split + 1..]).map_err(|_| ErrorKind::PrfType)?;
    Ok(InfEntry { tx, proof })
}
