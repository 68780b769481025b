//! Consolidation-round configuration.

use ezchain_core::{ProtocolConfig, DEFAULT_GAMMA};
use std::time::Duration;

/// Phase timeouts for one consolidation round.
///
/// Whether these are consensus-critical or per-deployment tunables is an
/// open question of the protocol; they are carried as configuration and
/// default to the source's 10 seconds each.
#[derive(Debug, Clone)]
pub struct CcConfig {
    pub gamma_1: Duration,
    pub gamma_2: Duration,
    pub gamma_3: Duration,
    pub gamma_4: Duration,
}

impl Default for CcConfig {
    fn default() -> Self {
        Self {
            gamma_1: DEFAULT_GAMMA,
            gamma_2: DEFAULT_GAMMA,
            gamma_3: DEFAULT_GAMMA,
            gamma_4: DEFAULT_GAMMA,
        }
    }
}

impl From<&ProtocolConfig> for CcConfig {
    fn from(config: &ProtocolConfig) -> Self {
        Self {
            gamma_1: config.gamma_1,
            gamma_2: config.gamma_2,
            gamma_3: config.gamma_3,
            gamma_4: config.gamma_4,
        }
    }
}
