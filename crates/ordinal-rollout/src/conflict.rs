//! Bounded retry of a workload update across optimistic-concurrency conflicts.
//!
//! On conflict the latest version is re-fetched, the mutation is re-applied
//! to it, and the update is retried. Any other failure stops immediately.

use std::time::Duration;

use tracing::debug;

use ordinal_state::{WorkloadId, WorkloadSet, WorkloadStore};

use crate::error::{RolloutError, classify};
use crate::shutdown::{self, Shutdown};

/// Retry budget for conflicting updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictRetry {
    /// Total update attempts, including the first.
    pub max_attempts: u32,
    /// Delay before re-fetching after a conflict.
    pub interval: Duration,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            interval: Duration::from_millis(10),
        }
    }
}

/// Persist `partition` (plus whatever `reapply` sets) on the workload set.
///
/// The first attempt is made against `workload` as given. Each conflict
/// consumes one attempt; when the budget runs out the last conflict is
/// returned, classified.
pub async fn update_with_conflict_retry<F>(
    store: &dyn WorkloadStore,
    id: &WorkloadId,
    workload: &WorkloadSet,
    partition: u32,
    policy: &ConflictRetry,
    shutdown: &Shutdown,
    reapply: F,
) -> Result<WorkloadSet, RolloutError>
where
    F: Fn(&mut WorkloadSet) + Send + Sync,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut candidate = workload.clone();
    reapply(&mut candidate);
    candidate.set_partition(partition);

    let mut attempt = 1;
    loop {
        match store.update(&candidate).await {
            Ok(stored) => {
                if attempt > 1 {
                    debug!(%id, partition, attempt, "update persisted after conflict");
                }
                return Ok(stored);
            }
            Err(err) if err.is_conflict() && attempt < max_attempts => {
                debug!(
                    %id,
                    partition,
                    attempt,
                    error = %err,
                    "conflict updating workload set, retrying against latest version"
                );
            }
            Err(err) => return Err(classify(err, id).into()),
        }

        if shutdown::sleep_or_cancel(policy.interval, shutdown).await {
            return Err(RolloutError::Cancelled { ordinal: partition });
        }

        candidate = store.get(id).await.map_err(|e| classify(e, id))?;
        reapply(&mut candidate);
        candidate.set_partition(partition);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use ordinal_state::{InstanceTemplate, StateResult, StateStore};

    use super::*;
    use crate::error::ErrorKind;

    /// Lets a concurrent writer sneak in before the first `conflicts` updates.
    struct RacingStore {
        inner: StateStore,
        conflicts: AtomicU32,
        updates: AtomicU32,
    }

    impl RacingStore {
        fn new(conflicts: u32) -> Self {
            let inner = StateStore::open_in_memory().unwrap();
            inner
                .put_workload(&WorkloadSet::new(&id(), 3, InstanceTemplate::new("v1")))
                .unwrap();
            Self {
                inner,
                conflicts: AtomicU32::new(conflicts),
                updates: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl WorkloadStore for RacingStore {
        async fn get(&self, id: &WorkloadId) -> StateResult<WorkloadSet> {
            self.inner.get(id).await
        }

        async fn update(&self, workload: &WorkloadSet) -> StateResult<WorkloadSet> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            let left = self.conflicts.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts.store(left - 1, Ordering::SeqCst);
                self.inner
                    .update_status(&workload.id(), |status| status.observed_generation += 1)?;
            }
            self.inner.update(workload).await
        }
    }

    fn id() -> WorkloadId {
        WorkloadId::new("db", "cockroach")
    }

    fn set_image(w: &mut WorkloadSet) {
        w.spec.template.image = "v2".to_string();
    }

    #[tokio::test(start_paused = true)]
    async fn persists_after_conflicts_below_budget() {
        let store = RacingStore::new(3);
        let held = store.get(&id()).await.unwrap();

        let stored = update_with_conflict_retry(
            &store,
            &id(),
            &held,
            2,
            &ConflictRetry::default(),
            &shutdown::never(),
            set_image,
        )
        .await
        .unwrap();

        assert_eq!(stored.partition(), Some(2));
        assert_eq!(stored.spec.template.image, "v2");
        assert_eq!(store.updates.load(Ordering::SeqCst), 4);
        assert_eq!(
            store.inner.get_workload(&id()).unwrap().unwrap().partition(),
            Some(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_is_conflict() {
        let store = RacingStore::new(6);
        let held = store.get(&id()).await.unwrap();
        let policy = ConflictRetry {
            max_attempts: 6,
            interval: Duration::from_millis(10),
        };

        let err = update_with_conflict_retry(
            &store,
            &id(),
            &held,
            1,
            &policy,
            &shutdown::never(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.updates.load(Ordering::SeqCst), 6);
        assert_eq!(store.inner.get_workload(&id()).unwrap().unwrap().partition(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn non_conflict_failure_short_circuits() {
        let store = RacingStore::new(0);
        let held = store.get(&id()).await.unwrap();

        // Partition above the replica count is rejected by the store.
        let err = update_with_conflict_retry(
            &store,
            &id(),
            &held,
            7,
            &ConflictRetry::default(),
            &shutdown::never(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Status);
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_between_attempts() {
        let store = RacingStore::new(1);
        let held = store.get(&id()).await.unwrap();
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();

        let err = update_with_conflict_retry(
            &store,
            &id(),
            &held,
            0,
            &ConflictRetry::default(),
            &rx,
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RolloutError::Cancelled { ordinal: 0 }));
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    }
}
