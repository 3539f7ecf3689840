//! SSH tunnel configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};

/// Settings for the SSH local-forward supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// ssh client binary
    pub ssh_program: String,

    /// How long to wait for the forwarded port to accept connections (seconds)
    #[serde(with = "duration_secs")]
    pub ready_timeout: Duration,

    /// Pause between readiness probes (milliseconds)
    #[serde(with = "duration_millis")]
    pub probe_interval: Duration,

    /// Extra grace period after the probe succeeds (milliseconds)
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            ready_timeout: Duration::from_secs(10),
            probe_interval: Duration::from_millis(250),
            settle_delay: Duration::ZERO,
        }
    }
}
