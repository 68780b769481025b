//! The protocol error taxonomy.

use std::fmt;

/// Every error kind the statistics log can record.
///
/// These are kinds, not types: each validation failure discards the
/// offending message, records its kind with the simulation timestamp, and
/// the node continues. A Byzantine peer cannot crash a correct node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed transaction.
    TxType,
    /// Malformed or structurally invalid proof.
    PrfType,
    /// Receipt addressed to the wrong recipient.
    RecvNode,
    /// Proof does not start at a valid genesis or post-CC anchor.
    InitHigh,
    /// Empty proof or empty proof step.
    EmptyPrf,
    /// More than one valid spend of a Value in one author group.
    DoubleSpent,
    /// Continuity violation: the author published a set the proof omits.
    PrfIncomplete,
    /// Proof spans a CC boundary incorrectly. Reserved: the source defines
    /// the kind but never emits it.
    CrossCc,
    /// Final proof owner differs from the claimed sender.
    WrongOwner,
    /// Transaction-set with no transactions.
    InfEmpty,
    /// Transaction-set digest mismatch.
    InfAbs,
    /// AC chain does not cover a required height.
    AccHeight,
    /// AC chain does not reach back to the previous CC boundary.
    AccBegin,
    /// No valid spend of a Value in one author group.
    NotSpend,
    /// Compaction produced a proof without an anchor.
    AfterCc,
}

impl ErrorKind {
    /// Stable name used in the statistics CSV.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TxType => "tx_type",
            ErrorKind::PrfType => "prf_type",
            ErrorKind::RecvNode => "recv_node",
            ErrorKind::InitHigh => "init_high",
            ErrorKind::EmptyPrf => "empty_prf",
            ErrorKind::DoubleSpent => "double_spent",
            ErrorKind::PrfIncomplete => "prf_incomplete",
            ErrorKind::CrossCc => "cross_CC",
            ErrorKind::WrongOwner => "wrong_owner",
            ErrorKind::InfEmpty => "inf_empty",
            ErrorKind::InfAbs => "inf_abs",
            ErrorKind::AccHeight => "acc_height",
            ErrorKind::AccBegin => "acc_begin",
            ErrorKind::NotSpend => "not_spend",
            ErrorKind::AfterCc => "after_cc",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
