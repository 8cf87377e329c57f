//! Verification poller: retry a fallible check with exponential backoff.
//!
//! The check runs once immediately. After each failure the poller sleeps
//! for the current interval (randomized by `randomization_factor`, capped
//! at `max_interval`), then grows the interval by `multiplier`. It gives up
//! once the next sleep would carry it past `max_elapsed_time`.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::context::TimingConfig;
use crate::shutdown::{self, Shutdown};

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub initial_interval: Duration,
    pub multiplier: f64,
    /// Each sleep is drawn from `interval * (1 ± randomization_factor)`.
    pub randomization_factor: f64,
    pub max_interval: Duration,
    pub max_elapsed_time: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval: Duration::from_secs(60),
            max_elapsed_time: Duration::from_secs(15 * 60),
        }
    }
}

impl ExponentialBackoff {
    /// Default growth, bounded by the rollout's per-replica budget.
    pub fn for_timing(timing: &TimingConfig) -> Self {
        Self {
            max_interval: timing.pod_max_polling_interval,
            max_elapsed_time: timing.pod_update_timeout,
            ..Self::default()
        }
    }

    /// Same schedule with randomization turned off.
    pub fn without_jitter(self) -> Self {
        Self {
            randomization_factor: 0.0,
            ..self
        }
    }

    fn first_interval(&self) -> Duration {
        self.initial_interval.min(self.max_interval)
    }

    fn grow(&self, current: Duration) -> Duration {
        current
            .mul_f64(self.multiplier.max(1.0))
            .min(self.max_interval)
    }

    fn randomize(&self, interval: Duration) -> Duration {
        let factor = self.randomization_factor.clamp(0.0, 1.0);
        if factor == 0.0 || interval.is_zero() {
            return interval;
        }
        let secs = interval.as_secs_f64();
        let low = secs * (1.0 - factor);
        let high = secs * (1.0 + factor);
        Duration::from_secs_f64(rand::random_range(low..=high)).min(self.max_interval)
    }
}

/// Why polling stopped without success.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("gave up after {attempts} attempts in {elapsed:?}")]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: anyhow::Error,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Run `check` until it succeeds, the backoff budget is spent, or
/// `shutdown` fires. Returns the number of attempts it took.
pub async fn poll_until<F, Fut>(
    backoff: &ExponentialBackoff,
    shutdown: &Shutdown,
    mut check: F,
) -> Result<u32, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let start = Instant::now();
    let mut cancel = shutdown.clone();
    let mut interval = backoff.first_interval();
    let mut attempts = 0u32;

    loop {
        if shutdown::is_cancelled(&cancel) {
            return Err(PollError::Cancelled { attempts });
        }
        attempts += 1;

        let outcome = tokio::select! {
            outcome = check() => outcome,
            _ = shutdown::cancelled(&mut cancel) => {
                return Err(PollError::Cancelled { attempts });
            }
        };
        let err = match outcome {
            Ok(()) => return Ok(attempts),
            Err(e) => e,
        };

        let elapsed = start.elapsed();
        let wait = backoff.randomize(interval);
        if elapsed + wait > backoff.max_elapsed_time {
            return Err(PollError::Timeout {
                attempts,
                elapsed,
                last: err,
            });
        }

        debug!(attempt = attempts, ?wait, error = %err, "check not yet satisfied");
        if shutdown::sleep_or_cancel(wait, &cancel).await {
            return Err(PollError::Cancelled { attempts });
        }
        interval = backoff.grow(interval);
    }
}
