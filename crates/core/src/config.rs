//! Protocol configuration.

use serde::Deserialize;
use std::time::Duration;

/// Default epoch length `T`.
pub const DEFAULT_EPOCH: Duration = Duration::from_secs(2000);

/// Default committee size cap `M`.
pub const DEFAULT_COMMITTEE: u64 = 40;

/// Default CC phase timeout (each of γ₁..γ₄).
pub const DEFAULT_GAMMA: Duration = Duration::from_secs(10);

/// Default bus delay upper bound.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Protocol parameters shared by every node.
///
/// `round`, the mining inter-block mean, is `epoch / m` unless overridden.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Node count `N`.
    #[serde(default = "default_n")]
    pub n: u64,

    /// Committee size cap `M`.
    #[serde(default = "default_m")]
    pub m: u64,

    /// Epoch length `T` between two CC rounds.
    #[serde(default = "default_epoch", with = "secs")]
    pub epoch: Duration,

    /// Poisson mean of the initial Value count per node.
    #[serde(default = "default_n_v")]
    pub n_v: f64,

    /// Per-node transaction generation rate `k` (mean inter-arrival `1/k`).
    #[serde(default = "default_tx_rate")]
    pub tx_rate: f64,

    /// Whether the consolidation protocol runs at all.
    #[serde(default = "default_use_cc")]
    pub use_cc: bool,

    /// Explicit mining inter-block mean; `epoch / m` when unset.
    #[serde(default, with = "opt_secs")]
    pub round: Option<Duration>,

    /// CC phase timeouts γ₁..γ₄.
    #[serde(default = "default_gamma", with = "secs")]
    pub gamma_1: Duration,
    #[serde(default = "default_gamma", with = "secs")]
    pub gamma_2: Duration,
    #[serde(default = "default_gamma", with = "secs")]
    pub gamma_3: Duration,
    #[serde(default = "default_gamma", with = "secs")]
    pub gamma_4: Duration,

    /// Bus delay upper bound; deliveries sample uniformly from `[0, delay)`.
    #[serde(default = "default_delay", with = "secs")]
    pub delay: Duration,

    /// Abstract size in KB, for the storage statistics.
    #[serde(default = "default_abs_size")]
    pub abs_size: f64,

    /// Transaction size in bytes, for the storage statistics.
    #[serde(default = "default_tx_size")]
    pub tx_size: f64,

    /// CC block size in bytes, for the storage statistics.
    #[serde(default = "default_ccb_size")]
    pub ccb_size: f64,
}

fn default_n() -> u64 {
    300
}

fn default_m() -> u64 {
    DEFAULT_COMMITTEE
}

fn default_epoch() -> Duration {
    DEFAULT_EPOCH
}

fn default_n_v() -> f64 {
    8.0
}

fn default_tx_rate() -> f64 {
    0.01
}

fn default_use_cc() -> bool {
    true
}

fn default_gamma() -> Duration {
    DEFAULT_GAMMA
}

fn default_delay() -> Duration {
    DEFAULT_DELAY
}

fn default_abs_size() -> f64 {
    0.2
}

fn default_tx_size() -> f64 {
    62.5
}

fn default_ccb_size() -> f64 {
    1024.0
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            n: default_n(),
            m: default_m(),
            epoch: DEFAULT_EPOCH,
            n_v: default_n_v(),
            tx_rate: default_tx_rate(),
            use_cc: true,
            round: None,
            gamma_1: DEFAULT_GAMMA,
            gamma_2: DEFAULT_GAMMA,
            gamma_3: DEFAULT_GAMMA,
            gamma_4: DEFAULT_GAMMA,
            delay: DEFAULT_DELAY,
            abs_size: default_abs_size(),
            tx_size: default_tx_size(),
            ccb_size: default_ccb_size(),
        }
    }
}

impl ProtocolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mining inter-block mean: `epoch / m` unless explicitly configured.
    ///
    /// Each node's mining timer is exponential with mean `round · n`, so the
    /// network-wide inter-block mean is `round`.
    pub fn round(&self) -> Duration {
        if let Some(round) = self.round {
            return round;
        }
        if self.m == 0 {
            return self.epoch;
        }
        self.epoch / self.m as u32
    }

    /// Mean of one node's mining timer: `round · n`.
    pub fn mining_mean(&self) -> Duration {
        self.round() * self.n as u32
    }

    /// Mean transaction inter-arrival time: `1 / tx_rate`.
    pub fn tx_interval_mean(&self) -> Duration {
        if self.tx_rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64(1.0 / self.tx_rate)
    }

    pub fn with_nodes(mut self, n: u64) -> Self {
        self.n = n;
        self
    }

    pub fn with_committee(mut self, m: u64) -> Self {
        self.m = m;
        self
    }

    pub fn with_epoch(mut self, epoch: Duration) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn with_initial_values(mut self, n_v: f64) -> Self {
        self.n_v = n_v;
        self
    }

    pub fn with_tx_rate(mut self, tx_rate: f64) -> Self {
        self.tx_rate = tx_rate;
        self
    }

    pub fn with_use_cc(mut self, use_cc: bool) -> Self {
        self.use_cc = use_cc;
        self
    }

    pub fn with_round(mut self, round: Duration) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_gammas(mut self, gamma: Duration) -> Self {
        self.gamma_1 = gamma;
        self.gamma_2 = gamma;
        self.gamma_3 = gamma;
        self.gamma_4 = gamma;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_is_epoch_over_committee() {
        let config = ProtocolConfig::default()
            .with_epoch(Duration::from_secs(2000))
            .with_committee(40);
        assert_eq!(config.round(), Duration::from_secs(50));
    }

    #[test]
    fn test_mining_mean_scales_with_nodes() {
        let config = ProtocolConfig::default()
            .with_nodes(10)
            .with_epoch(Duration::from_secs(100))
            .with_committee(10);
        assert_eq!(config.mining_mean(), Duration::from_secs(100));
    }

    #[test]
    fn test_tx_interval_mean() {
        let config = ProtocolConfig::default().with_tx_rate(0.01);
        assert_eq!(config.tx_interval_mean(), Duration::from_secs(100));
    }
}
