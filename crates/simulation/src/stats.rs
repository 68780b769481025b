//! Simulation statistics and the CSV recorder.

use crate::NodeIndex;
use ezchain_core::ErrorKind;
use ezchain_node::Statistics;
use std::fmt::Write as _;
use std::time::Duration;

/// One recorded protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRecord {
    pub time: Duration,
    pub node: NodeIndex,
    pub kind: ErrorKind,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Messages delivered (scheduled for arrival).
    pub messages_sent: u64,
    /// Messages dropped because an endpoint was offline.
    pub messages_dropped: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
    /// Nodes aborted on structural invariant violations.
    pub aborts: u64,
    /// Every protocol error recorded, with its simulation timestamp.
    pub errors: Vec<ErrorRecord>,
}

impl SimulationStats {
    /// Number of recorded errors of one kind.
    pub fn error_count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// Render the error log as CSV (`time_ms,node,kind`).
    pub fn errors_csv(&self) -> String {
        let mut out = String::from("time_ms,node,kind\n");
        for record in &self.errors {
            let _ = writeln!(
                out,
                "{},{},{}",
                record.time.as_millis(),
                record.node,
                record.kind
            );
        }
        out
    }
}

/// Render per-node statistics as CSV.
pub fn statistics_csv(stats: &[(NodeIndex, Statistics)]) -> String {
    let mut out = String::from("node,ccpt,acc_storage,ccc_storage,pbc_storage\n");
    for (node, s) in stats {
        let _ = writeln!(
            out,
            "{},{:.3},{:.1},{:.1},{:.1}",
            node, s.ccpt, s.acc_storage, s.ccc_storage, s.pbc_storage
        );
    }
    out
}
