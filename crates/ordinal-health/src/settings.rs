//! Gate settings, resolved from `ordinal.toml`.

use std::time::Duration;

use ordinal_core::{ConfigError, OrdinalConfig};

/// How cluster health is probed at each checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSettings {
    /// HTTP path requested on every replica.
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Base wait between rounds; doubles after each failed round.
    pub interval: Duration,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            endpoint: "/health".to_string(),
            timeout: Duration::from_secs(2),
            interval: Duration::from_secs(1),
            healthy_threshold: 2,
            unhealthy_threshold: 3,
        }
    }
}

impl HealthSettings {
    pub fn from_config(config: &OrdinalConfig) -> Result<Self, ConfigError> {
        let (healthy_threshold, unhealthy_threshold) = config.health_thresholds()?;
        Ok(Self {
            endpoint: config.health_endpoint(),
            timeout: config.health_timeout()?,
            interval: config.health_interval()?,
            healthy_threshold,
            unhealthy_threshold,
        })
    }
}

/// How long to wait for every replica to report ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl ReadinessSettings {
    pub fn from_config(config: &OrdinalConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            poll_interval: config.readiness_poll_interval()?,
            timeout: config.readiness_timeout()?,
        })
    }
}
