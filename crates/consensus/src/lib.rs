//! Committee-based consolidation-chain consensus for EZchain.
//!
//! Every epoch the producers of the epoch's AC blocks form a committee and
//! agree on a CC block that finalizes the fate of the epoch's
//! transaction-sets: sets nobody can produce are rejected, individual
//! invalid transactions are masked, and contested verdicts can be appealed
//! with a proof-of-spend before finalization.

mod config;
mod sig_set;
mod state;

pub use config::CcConfig;
pub use sig_set::SignatureSet;
pub use state::{CcPhase, CcState, ConsensusError, EpochSnapshot};
