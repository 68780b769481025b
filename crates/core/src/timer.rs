//! Timer identification.
//!
//! The state machine emits `Action::SetTimer` / `Action::CancelTimer`; the
//! runner turns them into scheduled events. A node holds at most one pending
//! mining timer and one pending CC phase timer; replacing either always goes
//! through a cancel.

use crate::event::{GammaPhase, ProtocolEvent};

/// Identifies a timer a node can arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Next local transaction generation.
    TxGen,
    /// Next mining attempt (exponential race).
    Mining,
    /// Next epoch boundary.
    Epoch,
    /// A CC phase window (at most one outstanding per node).
    Gamma(GammaPhase),
}

impl TimerId {
    /// The event delivered when this timer fires.
    pub fn into_event(self) -> ProtocolEvent {
        match self {
            TimerId::TxGen => ProtocolEvent::TxTimer,
            TimerId::Mining => ProtocolEvent::MiningTimer,
            TimerId::Epoch => ProtocolEvent::EpochTimer,
            TimerId::Gamma(phase) => ProtocolEvent::GammaTimeout(phase),
        }
    }
}
