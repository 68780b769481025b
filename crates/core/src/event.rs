//! Protocol events for the deterministic node state machine.

use ezchain_types::{AcBlock, Appeal, CcBlock, CommitteeSig, InfExchange, Receipt, TransactionSet};

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
///
/// This ensures causality is preserved: timers a node set for itself fire
/// before new external inputs arriving at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Timer events: scheduled by the node itself.
    Timer = 0,

    /// Network events: external inputs from other nodes.
    Network = 1,
}

/// The four CC phase windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GammaPhase {
    One,
    Two,
    Three,
    Four,
}

/// All events a node can receive.
///
/// Events are **passive data** — they describe something that happened.
/// The state machine processes events and returns actions; every handler
/// runs to completion (no suspension points).
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// Time to mint the next local transaction (Poisson process).
    TxTimer,

    /// The PoW-modelled mining timer fired: produce an AC block.
    MiningTimer,

    /// Epoch boundary: start a CC round if this node is in the committee.
    EpochTimer,

    /// A CC phase window elapsed.
    GammaTimeout(GammaPhase),

    // ═══════════════════════════════════════════════════════════════════════
    // Network — announce chain
    // ═══════════════════════════════════════════════════════════════════════
    /// A peer broadcast a transaction-set for packing.
    InfReceived { inf: TransactionSet },

    /// A peer produced an AC block.
    AcBlockReceived { block: AcBlock },

    /// A transfer addressed to this node reached the AC chain.
    ReceiptReceived { receipt: Receipt },

    // ═══════════════════════════════════════════════════════════════════════
    // Network — consolidation protocol
    // ═══════════════════════════════════════════════════════════════════════
    /// γ₁: a committee member's accumulated transaction-sets.
    InfExchangeReceived { exchange: InfExchange },

    /// γ₂: the leader's signed draft CC block.
    CcProposalReceived { block: CcBlock },

    /// γ₃: the leader's proposal, broadcast to the whole network.
    CcNoticeReceived { block: CcBlock },

    /// γ₄: the leader's amended block after appeals.
    CcAmendedReceived { block: CcBlock },

    /// The finalized CC block with its threshold signature set.
    CcFinalReceived {
        block: CcBlock,
        sigs: Vec<CommitteeSig>,
    },

    /// A committee member's signature over a draft or amended block.
    SignatureReceived { sig: CommitteeSig },

    /// A proof-of-spend contesting a draft verdict (γ₃ window).
    AppealReceived { appeal: Appeal },
}

impl ProtocolEvent {
    /// Get the priority for this event type.
    pub fn priority(&self) -> EventPriority {
        match self {
            ProtocolEvent::TxTimer
            | ProtocolEvent::MiningTimer
            | ProtocolEvent::EpochTimer
            | ProtocolEvent::GammaTimeout(_) => EventPriority::Timer,

            ProtocolEvent::InfReceived { .. }
            | ProtocolEvent::AcBlockReceived { .. }
            | ProtocolEvent::ReceiptReceived { .. }
            | ProtocolEvent::InfExchangeReceived { .. }
            | ProtocolEvent::CcProposalReceived { .. }
            | ProtocolEvent::CcNoticeReceived { .. }
            | ProtocolEvent::CcAmendedReceived { .. }
            | ProtocolEvent::CcFinalReceived { .. }
            | ProtocolEvent::SignatureReceived { .. }
            | ProtocolEvent::AppealReceived { .. } => EventPriority::Network,
        }
    }

    /// Get the event type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProtocolEvent::TxTimer => "TxTimer",
            ProtocolEvent::MiningTimer => "MiningTimer",
            ProtocolEvent::EpochTimer => "EpochTimer",
            ProtocolEvent::GammaTimeout(GammaPhase::One) => "Gamma1Timeout",
            ProtocolEvent::GammaTimeout(GammaPhase::Two) => "Gamma2Timeout",
            ProtocolEvent::GammaTimeout(GammaPhase::Three) => "Gamma3Timeout",
            ProtocolEvent::GammaTimeout(GammaPhase::Four) => "Gamma4Timeout",
            ProtocolEvent::InfReceived { .. } => "InfReceived",
            ProtocolEvent::AcBlockReceived { .. } => "AcBlockReceived",
            ProtocolEvent::ReceiptReceived { .. } => "ReceiptReceived",
            ProtocolEvent::InfExchangeReceived { .. } => "InfExchangeReceived",
            ProtocolEvent::CcProposalReceived { .. } => "CcProposalReceived",
            ProtocolEvent::CcNoticeReceived { .. } => "CcNoticeReceived",
            ProtocolEvent::CcAmendedReceived { .. } => "CcAmendedReceived",
            ProtocolEvent::CcFinalReceived { .. } => "CcFinalReceived",
            ProtocolEvent::SignatureReceived { .. } => "SignatureReceived",
            ProtocolEvent::AppealReceived { .. } => "AppealReceived",
        }
    }
}
