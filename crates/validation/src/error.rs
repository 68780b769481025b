//! Validation errors.

use ezchain_core::ErrorKind;
use ezchain_types::{BlockHeight, Hash, NodeId, ValueId};

/// Why a proof, transaction-set or receipt was rejected.
///
/// Every variant maps onto one statistics [`ErrorKind`]; rejection is
/// always local and non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed transaction")]
    TxMalformed,

    #[error("structurally invalid proof for value {0}")]
    ProofMalformed(ValueId),

    #[error("receipt addressed to {addressed}, handled by {local}")]
    WrongRecipient { addressed: NodeId, local: NodeId },

    #[error("proof for value {value} does not start at genesis or a post-CC anchor")]
    BadGenesis { value: ValueId },

    #[error("empty proof or empty proof step")]
    EmptyProof,

    #[error("value {value} spent {count} times in one author group")]
    DoubleSpent { value: ValueId, count: u32 },

    #[error("continuity violated at height {height} for author {author}")]
    Incomplete { author: NodeId, height: BlockHeight },

    #[error("final proof owner {found} does not match claimed sender {claimed}")]
    WrongOwner { claimed: NodeId, found: NodeId },

    #[error("transaction-set has no transactions")]
    InfEmpty,

    #[error("transaction-set digest mismatch (claimed {claimed})")]
    InfAbs { claimed: Hash },

    #[error("value {value} not spent in one author group")]
    NotSpent { value: ValueId },
}

impl ValidationError {
    /// The statistics kind this rejection is recorded as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::TxMalformed => ErrorKind::TxType,
            ValidationError::ProofMalformed(_) => ErrorKind::PrfType,
            ValidationError::WrongRecipient { .. } => ErrorKind::RecvNode,
            ValidationError::BadGenesis { .. } => ErrorKind::InitHigh,
            ValidationError::EmptyProof => ErrorKind::EmptyPrf,
            ValidationError::DoubleSpent { .. } => ErrorKind::DoubleSpent,
            ValidationError::Incomplete { .. } => ErrorKind::PrfIncomplete,
            ValidationError::WrongOwner { .. } => ErrorKind::WrongOwner,
            ValidationError::InfEmpty => ErrorKind::InfEmpty,
            ValidationError::InfAbs { .. } => ErrorKind::InfAbs,
            ValidationError::NotSpent { .. } => ErrorKind::NotSpend,
        }
    }
}
