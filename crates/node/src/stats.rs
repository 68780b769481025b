//! Per-node protocol statistics.

use ezchain_types::ValueId;
use std::collections::HashMap;

/// Counters feeding the statistics hook.
#[derive(Debug, Default)]
pub struct StatCounters {
    /// Transactions this node has sealed into broadcast sets.
    pub tx_send_cnt: u64,
    /// Abstracts this node has packed into AC blocks.
    pub abs_cnt: u64,
    /// Communication units spent on receipts (proof transactions shipped).
    pub comm_cost: u128,
    /// Latest proof length per Value this node has touched.
    tx_per_val: HashMap<ValueId, u64>,
}

impl StatCounters {
    pub fn set_value_txs(&mut self, value: ValueId, count: u64) {
        self.tx_per_val.insert(value, count);
    }

    pub fn add_comm(&mut self, units: u128) {
        self.comm_cost += units;
    }

    /// Mean proof length across touched Values.
    pub fn mean_txs_per_value(&self) -> f64 {
        if self.tx_per_val.is_empty() {
            return 0.0;
        }
        let total: u64 = self.tx_per_val.values().sum();
        total as f64 / self.tx_per_val.len() as f64
    }
}

/// Snapshot returned by the statistics hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Average communication cost per sealed transaction.
    pub ccpt: f64,
    /// AC chain storage footprint (abstract size × packed abstracts).
    pub acc_storage: f64,
    /// CC chain storage footprint (CC block size × chain length).
    pub ccc_storage: f64,
    /// Personal-chain storage footprint (mean proof length × tx size).
    pub pbc_storage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_txs_per_value() {
        let mut counters = StatCounters::default();
        assert_eq!(counters.mean_txs_per_value(), 0.0);
        counters.set_value_txs(ValueId(1), 4);
        counters.set_value_txs(ValueId(2), 2);
        counters.set_value_txs(ValueId(1), 6);
        assert_eq!(counters.mean_txs_per_value(), 4.0);
    }
}
