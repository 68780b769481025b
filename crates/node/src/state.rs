//! The per-node protocol state machine.

use crate::personal::PersonalChain;
use crate::pool::InfStaging;
use crate::stats::{StatCounters, Statistics};
use ezchain_consensus::{CcConfig, CcState};
use ezchain_core::{
    sampling, Action, IdGen, ProtocolConfig, ProtocolEvent, StateMachine, ThresholdVerifier,
    TimerId,
};
use ezchain_store::{BlobStore, StoreError};
use ezchain_types::{
    AcChain, BlockHeight, CcChain, NodeId, Proof, TransactionSet, ValueId,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One EZchain node: mines and ingests AC blocks, validates and adopts
/// value transfers, and participates in the consolidation protocol.
///
/// The node is a single-threaded state machine: [`handle`] is the only
/// mutator, every handler runs to completion, and all I/O happens through
/// the returned actions.
///
/// [`handle`]: StateMachine::handle
pub struct NodeStateMachine {
    pub(crate) id: NodeId,
    pub(crate) config: ProtocolConfig,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) store: Arc<dyn BlobStore>,
    pub(crate) tx_ids: IdGen,
    pub(crate) block_ids: IdGen,

    // ═══════════════════════════════════════════════════════════════════════
    // Chain state
    // ═══════════════════════════════════════════════════════════════════════
    pub(crate) ac: AcChain,
    pub(crate) cc: CcChain,
    pub(crate) personal: PersonalChain,
    /// Id and height of the AC tip in this node's view.
    pub(crate) tip_id: u64,
    pub(crate) tip_height: BlockHeight,

    // ═══════════════════════════════════════════════════════════════════════
    // Holdings and staging
    // ═══════════════════════════════════════════════════════════════════════
    /// Proofs of the Values this node currently holds.
    pub(crate) holdings: Vec<Proof>,
    pub(crate) staging: InfStaging,
    /// Verified sets awaiting packing into the next self-authored block.
    pub(crate) inf_buffer: Vec<TransactionSet>,
    /// Every set accepted during the current epoch (exchanged in γ₁).
    pub(crate) epoch_infs: Vec<TransactionSet>,
    /// Digests already sealed on the AC chain (never re-packed).
    pub(crate) sealed_abs: std::collections::BTreeSet<ezchain_types::Hash>,

    // ═══════════════════════════════════════════════════════════════════════
    // Epoch bookkeeping
    // ═══════════════════════════════════════════════════════════════════════
    /// Producers observed since the last accepted CC block.
    pub(crate) committee: BTreeSet<NodeId>,
    pub(crate) in_committee: bool,
    /// Producer of the first AC block of the running epoch.
    pub(crate) leader_hint: Option<NodeId>,
    /// AC blocks produced during the running epoch.
    pub(crate) block_epoch: u64,

    pub(crate) consensus: CcState,
    pub(crate) verifier: Arc<dyn ThresholdVerifier>,
    pub(crate) stats: StatCounters,
    pub(crate) now: Duration,
}

impl std::fmt::Debug for NodeStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStateMachine")
            .field("id", &self.id)
            .field("tip_height", &self.tip_height)
            .field("holdings", &self.holdings.len())
            .field("now", &self.now)
            .finish()
    }
}

impl NodeStateMachine {
    /// Create a node and mint its genesis Values.
    ///
    /// `value_ids`, `tx_ids` and `block_ids` are the harness-owned id
    /// namespaces; `seed` derives the node's private RNG stream. Failing to
    /// acquire the blob store here is the one fatal initialization error.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NodeId,
        config: ProtocolConfig,
        store: Arc<dyn BlobStore>,
        value_ids: IdGen,
        tx_ids: IdGen,
        block_ids: IdGen,
        verifier: Arc<dyn ThresholdVerifier>,
        seed: u64,
    ) -> Result<Self, StoreError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        // Probe the store before anything else: a node without its blob
        // cache cannot run.
        store.put(
            ezchain_store::Namespace::Pb,
            &format!("{} init", id),
            Vec::new(),
        )?;
        store.delete(ezchain_store::Namespace::Pb, &format!("{} init", id))?;

        // Initial holdings: Poisson-distributed around `n_v`, at least the
        // configured mean when the draw comes up empty.
        let mut count = sampling::poisson(&mut rng, config.n_v);
        if count == 0 {
            count = config.n_v.round() as u64;
        }
        let mut holdings = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let value = ValueId(value_ids.next());
            holdings.push(Proof::new(id, value, BlockHeight::GENESIS));
        }

        info!(node = id.0, values = holdings.len(), "node created");

        let cc_config = CcConfig::from(&config);
        let consensus = CcState::new(id, cc_config, verifier.clone(), block_ids.clone());

        Ok(Self {
            id,
            config,
            rng,
            store,
            tx_ids,
            block_ids,
            ac: AcChain::new(),
            cc: CcChain::new(),
            personal: PersonalChain::new(),
            tip_id: 0,
            tip_height: BlockHeight::GENESIS,
            holdings,
            staging: InfStaging::new(),
            inf_buffer: Vec::new(),
            epoch_infs: Vec::new(),
            sealed_abs: std::collections::BTreeSet::new(),
            committee: BTreeSet::new(),
            in_committee: false,
            leader_hint: None,
            block_epoch: 0,
            consensus,
            verifier,
            stats: StatCounters::default(),
            now: Duration::ZERO,
        })
    }

    /// Arm the initial timers and run the first generation pass.
    ///
    /// Called once by the harness before any events are delivered.
    pub fn initialize(&mut self) -> Vec<Action> {
        let mut actions = self.on_tx_timer();
        let mining = sampling::exponential(&mut self.rng, self.config.mining_mean());
        actions.push(Action::SetTimer {
            id: TimerId::Mining,
            duration: mining,
        });
        if self.config.use_cc {
            actions.push(Action::SetTimer {
                id: TimerId::Epoch,
                duration: self.config.epoch,
            });
        }
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors (used by the harness and tests)
    // ═══════════════════════════════════════════════════════════════════════

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn ac_chain(&self) -> &AcChain {
        &self.ac
    }

    pub fn cc_chain(&self) -> &CcChain {
        &self.cc
    }

    pub fn personal_chain(&self) -> &[ezchain_types::PersonalBlock] {
        self.personal.blocks()
    }

    /// Proofs of the currently held Values.
    pub fn holdings(&self) -> &[Proof] {
        &self.holdings
    }

    /// The held proof for one Value, if any.
    pub fn proof_of(&self, value: ValueId) -> Option<&Proof> {
        self.holdings.iter().find(|p| p.value == value)
    }

    pub fn committee(&self) -> &BTreeSet<NodeId> {
        &self.committee
    }

    pub fn consensus(&self) -> &CcState {
        &self.consensus
    }

    /// The statistics hook.
    pub fn statistic(&self) -> Statistics {
        let comm = self.stats.comm_cost + self.consensus.comm_cost();
        let ccpt = if self.stats.tx_send_cnt == 0 {
            0.0
        } else {
            comm as f64 / self.stats.tx_send_cnt as f64
        };
        Statistics {
            ccpt,
            acc_storage: self.config.abs_size * self.stats.abs_cnt as f64,
            ccc_storage: if self.config.use_cc {
                self.config.ccb_size * self.cc.len() as f64
            } else {
                0.0
            },
            pbc_storage: self.stats.mean_txs_per_value() * self.config.tx_size,
        }
    }
}

impl StateMachine for NodeStateMachine {
    fn handle(&mut self, event: ProtocolEvent) -> Vec<Action> {
        match event {
            ProtocolEvent::TxTimer => self.on_tx_timer(),
            ProtocolEvent::MiningTimer => self.on_mining_timer(),
            ProtocolEvent::EpochTimer => self.on_epoch_timer(),
            ProtocolEvent::InfReceived { inf } => self.on_inf(inf),
            ProtocolEvent::AcBlockReceived { block } => self.on_ac_block(block),
            ProtocolEvent::ReceiptReceived { receipt } => self.on_receipt(receipt),
            ProtocolEvent::GammaTimeout(phase) => self.on_gamma(phase),
            ProtocolEvent::InfExchangeReceived { exchange } => {
                self.consensus.on_exchange(&exchange, &self.ac, &self.cc)
            }
            ProtocolEvent::CcProposalReceived { block } => {
                self.consensus.on_proposal(&block, self.now)
            }
            ProtocolEvent::CcNoticeReceived { block } => self.on_cc_notice(block),
            ProtocolEvent::CcAmendedReceived { block } => {
                self.consensus.on_amended(&block, self.now)
            }
            ProtocolEvent::CcFinalReceived { block, sigs } => self.on_cc_final(block, sigs),
            ProtocolEvent::SignatureReceived { sig } => self.consensus.on_signature(&sig),
            ProtocolEvent::AppealReceived { appeal } => {
                self.consensus.on_appeal(&appeal, &self.ac, &self.cc)
            }
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
