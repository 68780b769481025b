//! EZchain simulator CLI.
//!
//! Runs a deterministic multi-node simulation with configurable protocol
//! parameters and writes the statistics CSVs.
//!
//! # Example
//!
//! ```bash
//! # A small deterministic run
//! ezchain-sim --seed 42 -n 20 -m 5 --epoch 200 --duration 1000
//! ```

use clap::Parser;
use ezchain_core::ProtocolConfig;
use ezchain_simulation::{statistics_csv, SimulationRunner};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// EZchain simulator.
///
/// Single-threaded and reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "ezchain-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Simulation duration in seconds
    #[arg(short = 'd', long, default_value = "10200")]
    duration: u64,

    /// Number of nodes
    #[arg(short = 'n', long, default_value = "100")]
    nodes: u64,

    /// Committee size cap
    #[arg(short = 'm', long, default_value = "20")]
    committee: u64,

    /// Epoch length in seconds
    #[arg(long, default_value = "2000")]
    epoch: u64,

    /// Poisson mean of initial Values per node
    #[arg(long, default_value = "8")]
    values: f64,

    /// Per-node transaction generation rate (1/s)
    #[arg(long, default_value = "0.025")]
    tx_rate: f64,

    /// Disable the consolidation protocol
    #[arg(long)]
    no_cc: bool,

    /// Bus delay upper bound in seconds
    #[arg(long, default_value = "2")]
    delay: u64,

    /// Random seed for reproducible results. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for the statistics CSV files
    #[arg(long, default_value = "result")]
    out: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,ezchain_simulation=info")),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let config = ProtocolConfig::default()
        .with_nodes(args.nodes)
        .with_committee(args.committee)
        .with_epoch(Duration::from_secs(args.epoch))
        .with_initial_values(args.values)
        .with_tx_rate(args.tx_rate)
        .with_use_cc(!args.no_cc)
        .with_delay(Duration::from_secs(args.delay));

    info!(
        nodes = args.nodes,
        committee = args.committee,
        epoch_secs = args.epoch,
        duration_secs = args.duration,
        use_cc = !args.no_cc,
        seed,
        "starting simulation"
    );

    let mut runner = SimulationRunner::new(config, seed);
    runner.initialize();
    runner.run_until(Duration::from_secs(args.duration));

    let stats = runner.stats();
    println!("events processed:  {}", stats.events_processed);
    println!("messages sent:     {}", stats.messages_sent);
    println!("timers set:        {}", stats.timers_set);
    println!("errors recorded:   {}", stats.errors.len());
    println!("aborts:            {}", stats.aborts);

    let node_stats = runner.statistics();
    let mean_ccpt: f64 =
        node_stats.iter().map(|(_, s)| s.ccpt).sum::<f64>() / node_stats.len().max(1) as f64;
    println!("mean CCPT:         {mean_ccpt:.3}");

    if let Err(e) = std::fs::create_dir_all(&args.out) {
        eprintln!("cannot create output directory: {e}");
        return;
    }
    let stats_path = args.out.join("statistics.csv");
    let errors_path = args.out.join("errors.csv");
    if let Err(e) = std::fs::write(&stats_path, statistics_csv(&node_stats)) {
        eprintln!("cannot write {}: {e}", stats_path.display());
    }
    if let Err(e) = std::fs::write(&errors_path, stats.errors_csv()) {
        eprintln!("cannot write {}: {e}", errors_path.display());
    }
    info!(out = %args.out.display(), "statistics written");
}
