//! Partitioned rolling update, one ordinal at a time, highest first.
//!
//! Setting a workload's partition to `p` lets only ordinals `>= p` move to
//! the new template. The strategy walks `p` from `replicas - 1` down to `0`
//! and for each ordinal:
//!
//! 1. skips it if the replica already verifies (resuming a previous run),
//! 2. waits for every replica to be ready,
//! 3. persists the partition, retrying on conflicts,
//! 4. polls the verifier until the replica converges,
//! 5. re-reads the workload so the next update is not stale,
//! 6. probes cluster health before moving on.
//!
//! Any failure stops the rollout at the current ordinal. Running it again
//! picks up where it left off because converged ordinals are skipped.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::capability::{ReplicaVerifier, UpdateStrategy};
use crate::conflict::{ConflictRetry, update_with_conflict_retry};
use crate::context::{RolloutContext, RolloutGates, RolloutOutcome};
use crate::error::{RolloutError, classify};
use crate::poller::{ExponentialBackoff, PollError, poll_until};

/// The ordinal-by-ordinal strategy.
pub struct PartitionedRollingUpdate {
    verifier: Arc<dyn ReplicaVerifier>,
    conflict_retry: ConflictRetry,
    jitter: bool,
}

impl PartitionedRollingUpdate {
    pub fn new(verifier: Arc<dyn ReplicaVerifier>) -> Self {
        Self {
            verifier,
            conflict_retry: ConflictRetry::default(),
            jitter: true,
        }
    }

    pub fn with_conflict_retry(mut self, conflict_retry: ConflictRetry) -> Self {
        self.conflict_retry = conflict_retry;
        self
    }

    /// Poll at exact backoff intervals instead of randomized ones.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    fn backoff(&self, gates: &RolloutGates) -> ExponentialBackoff {
        let backoff = ExponentialBackoff::for_timing(&gates.timing);
        if self.jitter {
            backoff
        } else {
            backoff.without_jitter()
        }
    }

    /// Steps 2 to 6 for one ordinal that is not yet converged.
    async fn update_ordinal(
        &self,
        ctx: &mut RolloutContext,
        gates: &RolloutGates,
        partition: u32,
    ) -> Result<(), RolloutError> {
        gates
            .readiness
            .wait_until_ready(&ctx.shutdown)
            .await
            .map_err(|source| RolloutError::ReadinessWait {
                ordinal: partition,
                source,
            })?;

        let desired = ctx.workload.spec.template.clone();
        ctx.workload.set_partition(partition);
        update_with_conflict_retry(
            ctx.store.as_ref(),
            &ctx.id,
            &ctx.workload,
            partition,
            &self.conflict_retry,
            &ctx.shutdown,
            |latest| latest.spec.template = desired.clone(),
        )
        .await
        .map_err(|e| e.at_ordinal(partition))?;

        debug!(partition, "waiting until partition done updating");
        let backoff = self.backoff(gates);
        let shared: &RolloutContext = ctx;
        let verifier = self.verifier.as_ref();
        poll_until(&backoff, &shared.shutdown, || verifier.verify(shared, partition))
            .await
            .map_err(|e| match e {
                PollError::Timeout {
                    attempts,
                    elapsed,
                    last,
                } => RolloutError::VerificationTimeout {
                    ordinal: partition,
                    attempts,
                    elapsed,
                    last,
                },
                PollError::Cancelled { .. } => RolloutError::Cancelled { ordinal: partition },
            })?;

        // The update bumped the resource version; the next partition step
        // must start from the stored copy or it will conflict.
        ctx.workload = ctx
            .store
            .get(&ctx.id)
            .await
            .map_err(|e| RolloutError::from(classify(e, &ctx.id)).at_ordinal(partition))?;

        let checkpoint = format!("between updating replicas for {}", ctx.id.name);
        gates
            .health
            .probe(&ctx.shutdown, &checkpoint, partition)
            .await
            .map_err(|source| RolloutError::HealthProbe {
                checkpoint,
                ordinal: partition,
                source,
            })?;

        info!(partition, "ordinal updated");
        Ok(())
    }
}

#[async_trait]
impl UpdateStrategy for PartitionedRollingUpdate {
    async fn roll_out(&self, ctx: &mut RolloutContext, gates: &RolloutGates) -> RolloutOutcome {
        let replicas = ctx.workload.spec.replicas;
        let mut skip_sleep = false;

        for partition in (0..replicas).rev() {
            if ctx.is_cancelled() {
                let err = RolloutError::Cancelled { ordinal: partition };
                error!(partition, error = %err, "rollout cancelled");
                return RolloutOutcome::failed(skip_sleep, err);
            }

            // Already updated: probably a retry of an earlier attempt. Don't
            // redo the update, and above all don't redo the waits.
            if self.verifier.verify(ctx, partition).await.is_ok() {
                debug!(partition, "already updated, skipping sleep");
                skip_sleep = true;
                continue;
            }
            skip_sleep = false;

            if let Err(err) = self.update_ordinal(ctx, gates, partition).await {
                error!(partition, error = %err, "rollout stopped");
                return RolloutOutcome::failed(skip_sleep, err);
            }
        }

        RolloutOutcome::completed(skip_sleep)
    }
}
