//! Per-node protocol core for EZchain.
//!
//! [`NodeStateMachine`] composes the pieces of one node: the transaction
//! pool and set staging, the AC miner and chain ingest, the receipt
//! handler with `get_owner` validation, the personal chain, the value/proof
//! table with compaction, and the consolidation-round engine.

mod handlers;
mod personal;
mod pool;
mod state;
mod stats;

pub use personal::PersonalChain;
pub use pool::InfStaging;
pub use state::NodeStateMachine;
pub use stats::{StatCounters, Statistics};
