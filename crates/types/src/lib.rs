//! Core protocol types for EZchain.
//!
//! This crate provides the foundational types used throughout the protocol
//! core:
//!
//! - **Primitives**: [`Hash`] (opaque Blake3 digest)
//! - **Identifiers**: [`NodeId`], [`ValueId`], [`TxId`], [`BlockHeight`]
//! - **Ledger types**: [`Transaction`], [`TransactionSet`], [`Proof`],
//!   [`AcBlock`], [`CcBlock`], [`PersonalBlock`], [`Receipt`]
//! - **Committee payloads**: [`CommitteeSig`], [`InfExchange`], [`Appeal`]
//! - **Chain arenas**: [`AcChain`], [`CcChain`]
//! - **Wire codec**: the delimited textual form of every persistent object
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not
//! depend on any other workspace crates, making it the foundation layer.

mod block;
mod chain;
mod committee;
mod hash;
mod identifiers;
mod proof;
mod receipt;
mod transaction;
pub mod wire;

pub use block::{AcBlock, CcBlock, InfVerdict, PersonalBlock};
pub use chain::{AcChain, CcChain};
pub use committee::{Appeal, CommitteeSig, InfExchange, SigPhase};
pub use hash::{Hash, HexError};
pub use identifiers::{BlockHeight, NodeId, TxId, ValueId};
pub use proof::{Proof, ProofStep};
pub use receipt::Receipt;
pub use transaction::{digest_of_txs, InfEntry, Transaction, TransactionSet};
pub use wire::WireError;
