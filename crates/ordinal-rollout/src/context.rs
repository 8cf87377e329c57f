//! Per-execution state threaded through one rollout.

use std::sync::Arc;
use std::time::Duration;

use ordinal_state::{WorkloadId, WorkloadSet, WorkloadStore};

use crate::capability::{HealthProbe, ReadinessWait};
use crate::error::RolloutError;
use crate::shutdown::{self, Shutdown};

/// Pacing for one rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Budget for one replica to verify after its partition step.
    pub pod_update_timeout: Duration,
    /// Cap on the verification polling interval.
    pub pod_max_polling_interval: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pod_update_timeout: Duration::from_secs(10 * 60),
            pod_max_polling_interval: Duration::from_secs(30),
        }
    }
}

/// Store handle, working copy and identity for one rollout.
///
/// Owned by the controller for the duration of one execution and never
/// shared between rollouts.
pub struct RolloutContext {
    pub store: Arc<dyn WorkloadStore>,
    /// Local copy of the workload set. Holds the desired spec; may be stale
    /// relative to the store between the strategy's re-fetches.
    pub workload: WorkloadSet,
    pub id: WorkloadId,
    pub shutdown: Shutdown,
}

impl RolloutContext {
    pub fn new(
        store: Arc<dyn WorkloadStore>,
        workload: WorkloadSet,
        id: WorkloadId,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            store,
            workload,
            id,
            shutdown,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        shutdown::is_cancelled(&self.shutdown)
    }
}

/// Timing plus the waits the strategy gates each ordinal on.
#[derive(Clone)]
pub struct RolloutGates {
    pub timing: TimingConfig,
    pub readiness: Arc<dyn ReadinessWait>,
    pub health: Arc<dyn HealthProbe>,
}

/// Result of one rollout execution.
///
/// `skip_sleep` is set when the last ordinal handled was already converged,
/// so no destructive waits happened for it and the caller may shorten its
/// own delay before trying again.
#[derive(Debug)]
pub struct RolloutOutcome {
    pub skip_sleep: bool,
    pub result: Result<(), RolloutError>,
}

impl RolloutOutcome {
    pub fn completed(skip_sleep: bool) -> Self {
        Self {
            skip_sleep,
            result: Ok(()),
        }
    }

    pub fn failed(skip_sleep: bool, error: RolloutError) -> Self {
        Self {
            skip_sleep,
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&RolloutError> {
        self.result.as_ref().err()
    }

    /// Collapse into `Ok(skip_sleep)`, dropping the hint on failure.
    pub fn into_result(self) -> Result<bool, RolloutError> {
        let skip_sleep = self.skip_sleep;
        self.result.map(|()| skip_sleep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_result_carries_skip_sleep_on_success() {
        assert!(RolloutOutcome::completed(true).into_result().unwrap());
        assert!(!RolloutOutcome::completed(false).into_result().unwrap());
    }

    #[test]
    fn into_result_keeps_error() {
        let outcome = RolloutOutcome::failed(true, RolloutError::Cancelled { ordinal: 2 });
        assert!(!outcome.is_ok());
        assert!(matches!(
            outcome.into_result(),
            Err(RolloutError::Cancelled { ordinal: 2 })
        ));
    }
}
