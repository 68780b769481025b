//! Actions: the outputs of the node state machine.

use crate::error::ErrorKind;
use crate::event::ProtocolEvent;
use crate::timer::TimerId;
use ezchain_types::{AcBlock, Appeal, CcBlock, CommitteeSig, InfExchange, NodeId, Receipt, TransactionSet};
use std::time::Duration;

/// Outbound network messages.
///
/// These are the messages a node can send to other nodes. The runner
/// performs the actual delivery, applying the bus delay model.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// A sealed transaction-set for packing into the next AC block.
    Inf(TransactionSet),

    /// A freshly produced AC block.
    AcBlock(AcBlock),

    /// A transfer receipt for the recipient of one transaction.
    Receipt(Receipt),

    /// γ₁ committee exchange of accumulated transaction-sets.
    InfExchange(InfExchange),

    /// γ₂ leader draft.
    CcProposal(CcBlock),

    /// γ₃ network-wide notice of the signed proposal.
    CcNotice(CcBlock),

    /// γ₄ amended block for re-signing.
    CcAmended(CcBlock),

    /// The finalized CC block with its signature set.
    CcFinal {
        block: CcBlock,
        sigs: Vec<CommitteeSig>,
    },

    /// A committee signature addressed to the leader.
    Signature(CommitteeSig),

    /// A proof-of-spend appeal against a draft verdict.
    Appeal(Appeal),
}

impl OutboundMessage {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::Inf(_) => "Inf",
            OutboundMessage::AcBlock(_) => "AcBlock",
            OutboundMessage::Receipt(_) => "Receipt",
            OutboundMessage::InfExchange(_) => "InfExchange",
            OutboundMessage::CcProposal(_) => "CcProposal",
            OutboundMessage::CcNotice(_) => "CcNotice",
            OutboundMessage::CcAmended(_) => "CcAmended",
            OutboundMessage::CcFinal { .. } => "CcFinal",
            OutboundMessage::Signature(_) => "Signature",
            OutboundMessage::Appeal(_) => "Appeal",
        }
    }

    /// Convert an outbound message to the corresponding inbound event.
    ///
    /// Used by the simulation runner to deliver messages uniformly.
    pub fn to_received_event(&self) -> ProtocolEvent {
        match self {
            OutboundMessage::Inf(inf) => ProtocolEvent::InfReceived { inf: inf.clone() },
            OutboundMessage::AcBlock(block) => ProtocolEvent::AcBlockReceived {
                block: block.clone(),
            },
            OutboundMessage::Receipt(receipt) => ProtocolEvent::ReceiptReceived {
                receipt: receipt.clone(),
            },
            OutboundMessage::InfExchange(exchange) => ProtocolEvent::InfExchangeReceived {
                exchange: exchange.clone(),
            },
            OutboundMessage::CcProposal(block) => ProtocolEvent::CcProposalReceived {
                block: block.clone(),
            },
            OutboundMessage::CcNotice(block) => ProtocolEvent::CcNoticeReceived {
                block: block.clone(),
            },
            OutboundMessage::CcAmended(block) => ProtocolEvent::CcAmendedReceived {
                block: block.clone(),
            },
            OutboundMessage::CcFinal { block, sigs } => ProtocolEvent::CcFinalReceived {
                block: block.clone(),
                sigs: sigs.clone(),
            },
            OutboundMessage::Signature(sig) => ProtocolEvent::SignatureReceived { sig: sig.clone() },
            OutboundMessage::Appeal(appeal) => ProtocolEvent::AppealReceived {
                appeal: appeal.clone(),
            },
        }
    }
}

/// All possible outputs of the node state machine.
///
/// The state machine performs no I/O; the runner executes these.
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a message to a specific node.
    Send {
        to: NodeId,
        message: OutboundMessage,
    },

    /// Broadcast a message to every other node.
    Broadcast { message: OutboundMessage },

    /// Arm (or re-arm) a timer. Setting an already-armed timer replaces it.
    SetTimer { id: TimerId, duration: Duration },

    /// Cancel a pending timer, if armed.
    CancelTimer { id: TimerId },

    /// Append an error record to the statistics log.
    ///
    /// Validation errors are local and non-fatal: the offending message is
    /// discarded and the node continues.
    RecordError { kind: ErrorKind },

    /// Abort this node. Only emitted for structural invariant violations
    /// (a missing epoch block in leader election) — never for peer input.
    Abort { kind: ErrorKind },
}
