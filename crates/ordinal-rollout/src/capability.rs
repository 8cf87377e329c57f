//! Injected behaviour.
//!
//! Each capability is a single-method trait so the controller and strategy
//! can be composed from independent pieces and tested with fakes.

use async_trait::async_trait;

use ordinal_state::WorkloadSet;

use crate::context::{RolloutContext, RolloutGates, RolloutOutcome};
use crate::shutdown::Shutdown;

/// Computes the desired workload set from the current one.
///
/// Must be pure: the result is only applied to the store by the strategy.
pub trait WorkloadTransform: Send + Sync {
    fn apply(&self, workload: WorkloadSet) -> anyhow::Result<WorkloadSet>;
}

impl<F> WorkloadTransform for F
where
    F: Fn(WorkloadSet) -> anyhow::Result<WorkloadSet> + Send + Sync,
{
    fn apply(&self, workload: WorkloadSet) -> anyhow::Result<WorkloadSet> {
        self(workload)
    }
}

/// Checks whether the replica at `ordinal` runs the desired spec.
///
/// Used both before mutating (to skip converged ordinals) and after.
#[async_trait]
pub trait ReplicaVerifier: Send + Sync {
    async fn verify(&self, ctx: &RolloutContext, ordinal: u32) -> anyhow::Result<()>;
}

/// Blocks until every replica of the workload is ready.
#[async_trait]
pub trait ReadinessWait: Send + Sync {
    async fn wait_until_ready(&self, shutdown: &Shutdown) -> anyhow::Result<()>;
}

/// Checks overall cluster health at a rollout checkpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, shutdown: &Shutdown, checkpoint: &str, ordinal: u32)
    -> anyhow::Result<()>;
}

/// Rolls a transformed workload set out to its replicas.
#[async_trait]
pub trait UpdateStrategy: Send + Sync {
    async fn roll_out(&self, ctx: &mut RolloutContext, gates: &RolloutGates) -> RolloutOutcome;
}
