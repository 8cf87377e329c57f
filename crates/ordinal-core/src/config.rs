//! ordinal.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::duration::parse_duration;

/// Errors raised while validating an `ordinal.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration for `{field}`: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdinalConfig {
    pub store: Option<StoreSection>,
    pub timing: Option<TimingSection>,
    pub retry: Option<RetrySection>,
    pub readiness: Option<ReadinessSection>,
    pub health: Option<HealthSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
}

/// Per-replica update pacing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingSection {
    /// How long a single replica may take to converge (e.g., "10m").
    pub pod_update_timeout: Option<String>,
    /// Upper bound on the verification polling interval (e.g., "30s").
    pub pod_max_polling_interval: Option<String>,
}

/// Optimistic-concurrency retry budget.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySection {
    /// Total update attempts, including the first.
    pub max_attempts: Option<u32>,
    /// Delay between attempts (e.g., "10ms").
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadinessSection {
    pub poll_interval: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthSection {
    /// HTTP path probed on every replica (e.g., "/health").
    pub endpoint: Option<String>,
    /// Timeout per probe request.
    pub timeout: Option<String>,
    /// Base interval between probe rounds.
    pub interval: Option<String>,
    /// Consecutive healthy rounds required to pass a checkpoint.
    pub healthy_threshold: Option<u32>,
    /// Consecutive failed rounds before a checkpoint fails.
    pub unhealthy_threshold: Option<u32>,
}

pub const DEFAULT_STORE_PATH: &str = "/var/lib/ordinal/state.redb";
pub const DEFAULT_POD_UPDATE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_POD_MAX_POLLING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 6;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

impl OrdinalConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: OrdinalConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field that has a value; missing fields fall back to defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pod_update_timeout()?;
        self.pod_max_polling_interval()?;
        self.retry_attempts()?;
        self.retry_interval()?;
        self.readiness_poll_interval()?;
        self.readiness_timeout()?;
        self.health_timeout()?;
        self.health_interval()?;
        self.health_thresholds()?;
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    pub fn pod_update_timeout(&self) -> Result<Duration, ConfigError> {
        let value = self.timing.as_ref().and_then(|t| t.pod_update_timeout.as_deref());
        non_zero(
            "timing.pod_update_timeout",
            duration_or("timing.pod_update_timeout", value, DEFAULT_POD_UPDATE_TIMEOUT)?,
        )
    }

    pub fn pod_max_polling_interval(&self) -> Result<Duration, ConfigError> {
        let value = self
            .timing
            .as_ref()
            .and_then(|t| t.pod_max_polling_interval.as_deref());
        non_zero(
            "timing.pod_max_polling_interval",
            duration_or(
                "timing.pod_max_polling_interval",
                value,
                DEFAULT_POD_MAX_POLLING_INTERVAL,
            )?,
        )
    }

    pub fn retry_attempts(&self) -> Result<u32, ConfigError> {
        match self.retry.as_ref().and_then(|r| r.max_attempts) {
            Some(0) => Err(ConfigError::Zero {
                field: "retry.max_attempts",
            }),
            Some(n) => Ok(n),
            None => Ok(DEFAULT_RETRY_ATTEMPTS),
        }
    }

    pub fn retry_interval(&self) -> Result<Duration, ConfigError> {
        let value = self.retry.as_ref().and_then(|r| r.interval.as_deref());
        duration_or("retry.interval", value, DEFAULT_RETRY_INTERVAL)
    }

    pub fn readiness_poll_interval(&self) -> Result<Duration, ConfigError> {
        let value = self.readiness.as_ref().and_then(|r| r.poll_interval.as_deref());
        non_zero(
            "readiness.poll_interval",
            duration_or("readiness.poll_interval", value, Duration::from_secs(2))?,
        )
    }

    pub fn readiness_timeout(&self) -> Result<Duration, ConfigError> {
        let value = self.readiness.as_ref().and_then(|r| r.timeout.as_deref());
        non_zero(
            "readiness.timeout",
            duration_or("readiness.timeout", value, Duration::from_secs(5 * 60))?,
        )
    }

    pub fn health_endpoint(&self) -> String {
        self.health
            .as_ref()
            .and_then(|h| h.endpoint.clone())
            .unwrap_or_else(|| "/health".to_string())
    }

    pub fn health_timeout(&self) -> Result<Duration, ConfigError> {
        let value = self.health.as_ref().and_then(|h| h.timeout.as_deref());
        non_zero(
            "health.timeout",
            duration_or("health.timeout", value, Duration::from_secs(2))?,
        )
    }

    pub fn health_interval(&self) -> Result<Duration, ConfigError> {
        let value = self.health.as_ref().and_then(|h| h.interval.as_deref());
        non_zero(
            "health.interval",
            duration_or("health.interval", value, Duration::from_secs(1))?,
        )
    }

    /// `(healthy_threshold, unhealthy_threshold)`.
    pub fn health_thresholds(&self) -> Result<(u32, u32), ConfigError> {
        let health = self.health.as_ref();
        let healthy = health.and_then(|h| h.healthy_threshold).unwrap_or(2);
        let unhealthy = health.and_then(|h| h.unhealthy_threshold).unwrap_or(3);
        if healthy == 0 {
            return Err(ConfigError::Zero {
                field: "health.healthy_threshold",
            });
        }
        if unhealthy == 0 {
            return Err(ConfigError::Zero {
                field: "health.unhealthy_threshold",
            });
        }
        Ok((healthy, unhealthy))
    }

    /// Scaffold a config with every default spelled out.
    pub fn scaffold(store_path: &Path) -> Self {
        OrdinalConfig {
            store: Some(StoreSection {
                path: Some(store_path.to_path_buf()),
            }),
            timing: Some(TimingSection {
                pod_update_timeout: Some("10m".to_string()),
                pod_max_polling_interval: Some("30s".to_string()),
            }),
            retry: Some(RetrySection {
                max_attempts: Some(DEFAULT_RETRY_ATTEMPTS),
                interval: Some("10ms".to_string()),
            }),
            readiness: Some(ReadinessSection {
                poll_interval: Some("2s".to_string()),
                timeout: Some("5m".to_string()),
            }),
            health: Some(HealthSection {
                endpoint: Some("/health".to_string()),
                timeout: Some("2s".to_string()),
                interval: Some("1s".to_string()),
                healthy_threshold: Some(2),
                unhealthy_threshold: Some(3),
            }),
        }
    }
}

fn duration_or(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(raw) => parse_duration(raw).ok_or_else(|| ConfigError::InvalidDuration {
            field,
            value: raw.to_string(),
        }),
        None => Ok(default),
    }
}

fn non_zero(field: &'static str, d: Duration) -> Result<Duration, ConfigError> {
    if d.is_zero() {
        Err(ConfigError::Zero { field })
    } else {
        Ok(d)
    }
}
