//! Event, action and state-machine plumbing for the EZchain protocol core.
//!
//! The core is built on a simple event-driven model:
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is synchronous, deterministic and performs no I/O.
//! The runner (the deterministic simulation harness) delivers events,
//! executes the returned actions, and converts deliveries back into events.

mod action;
mod config;
mod error;
mod event;
mod ids;
pub mod sampling;
mod timer;
mod traits;

pub use action::{Action, OutboundMessage};
pub use config::{
    ProtocolConfig, DEFAULT_COMMITTEE, DEFAULT_DELAY, DEFAULT_EPOCH, DEFAULT_GAMMA,
};
pub use error::ErrorKind;
pub use event::{EventPriority, GammaPhase, ProtocolEvent};
pub use ids::IdGen;
pub use timer::TimerId;
pub use traits::{MajorityVerifier, StateMachine, ThresholdVerifier};
