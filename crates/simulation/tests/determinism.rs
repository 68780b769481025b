//! Tests for deterministic simulation.
//!
//! The core property: given the same seed and configuration, a run
//! produces identical results — the foundation for debugging and replay.

use ezchain_core::ProtocolConfig;
use ezchain_simulation::SimulationRunner;
use std::time::Duration;

fn test_config() -> ProtocolConfig {
    ProtocolConfig::default()
        .with_nodes(5)
        .with_committee(5)
        .with_epoch(Duration::from_secs(50))
        .with_initial_values(3.0)
        .with_tx_rate(0.05)
        .with_gammas(Duration::from_secs(5))
        .with_delay(Duration::from_secs(1))
}

#[test]
fn test_runner_creation() {
    let runner = SimulationRunner::new(test_config(), 42);
    assert_eq!(runner.num_nodes(), 5);
    assert!(runner.node(0).is_some());
    assert!(runner.node(4).is_some());
    assert!(runner.node(5).is_none());
}

#[test]
fn test_initialization_schedules_work() {
    let mut runner = SimulationRunner::new(test_config(), 42);
    runner.initialize();
    runner.run_until(Duration::from_secs(5));
    // At minimum the initial set broadcasts were delivered.
    assert!(runner.stats().events_processed > 0);
    assert!(runner.stats().messages_sent > 0);
}

#[test]
fn test_same_seed_same_run() {
    let seed = 12345u64;
    let mut results = Vec::new();

    for _ in 0..2 {
        let mut runner = SimulationRunner::new(test_config(), seed);
        runner.initialize();
        runner.run_until(Duration::from_secs(120));

        let stats = runner.stats().clone();
        let tips: Vec<u64> = (0..runner.num_nodes() as u64)
            .map(|i| runner.node(i).unwrap().ac_chain().tip_height().0)
            .collect();
        let held: usize = (0..runner.num_nodes() as u64)
            .map(|i| runner.node(i).unwrap().holdings().len())
            .sum();
        results.push((
            stats.events_processed,
            stats.messages_sent,
            stats.timers_set,
            stats.errors.len(),
            tips,
            held,
        ));
    }

    assert_eq!(results[0], results[1], "same seed must reproduce the run");
}
