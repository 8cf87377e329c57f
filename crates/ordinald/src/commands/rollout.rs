use std::sync::Arc;

use tracing::info;

use ordinal_core::OrdinalConfig;
use ordinal_health::{HealthSettings, HttpClusterProbe, ReadinessSettings, StoreReadiness};
use ordinal_rollout::{
    ConflictRetry, PartitionedRollingUpdate, RevisionVerifier, RolloutController, RolloutGates,
    RolloutOutcome, SetImage, Shutdown, TimingConfig, UpdateSuite,
};
use ordinal_state::{WorkloadId, WorkloadStore};

use super::open_store;

/// Wire a controller from `config` and roll `image` out to `id`.
///
/// Configuration and store errors are returned directly; everything that
/// happens once the rollout starts is reported in the outcome.
pub async fn rollout(
    config: &OrdinalConfig,
    id: &WorkloadId,
    image: &str,
    shutdown: Shutdown,
) -> anyhow::Result<RolloutOutcome> {
    let store: Arc<dyn WorkloadStore> = Arc::new(open_store(config)?);

    let timing = TimingConfig {
        pod_update_timeout: config.pod_update_timeout()?,
        pod_max_polling_interval: config.pod_max_polling_interval()?,
    };
    let gates = RolloutGates {
        timing,
        readiness: Arc::new(StoreReadiness::new(
            store.clone(),
            id.clone(),
            ReadinessSettings::from_config(config)?,
        )),
        health: Arc::new(HttpClusterProbe::new(
            store.clone(),
            id.clone(),
            HealthSettings::from_config(config)?,
        )),
    };

    let strategy = PartitionedRollingUpdate::new(Arc::new(RevisionVerifier)).with_conflict_retry(
        ConflictRetry {
            max_attempts: config.retry_attempts()?,
            interval: config.retry_interval()?,
        },
    );
    let suite = UpdateSuite::new(Arc::new(SetImage::new(image)), Arc::new(strategy));

    info!(%id, %image, ?timing, "rollout requested");
    let controller = RolloutController::new(store, gates);
    Ok(controller.run(id, &suite, shutdown).await)
}

#[cfg(test)]
mod tests {
    use ordinal_rollout::shutdown;
    use ordinal_state::{InstanceTemplate, ReplicaStatus, WorkloadSet};

    use super::*;
    use crate::commands::testutil::config_in;

    fn id() -> WorkloadId {
        WorkloadId::new("db", "cockroach")
    }

    /// Seed a workload set whose replicas all run `image` and are ready.
    fn seed(config: &OrdinalConfig, replicas: u32, image: &str) {
        let store = open_store(config).unwrap();
        let mut workload = WorkloadSet::new(&id(), replicas, InstanceTemplate::new("v1"));
        let revision = InstanceTemplate::new(image).revision();
        workload.status.replicas = (0..replicas)
            .map(|ordinal| ReplicaStatus {
                ordinal,
                revision: revision.clone(),
                ready: true,
                address: None,
            })
            .collect();
        store.put_workload(&workload).unwrap();
    }

    #[tokio::test]
    async fn converged_replicas_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        seed(&config, 3, "v2");

        let outcome = rollout(&config, &id(), "v2", shutdown::never()).await.unwrap();

        assert!(outcome.is_ok(), "{:?}", outcome.error());
        assert!(outcome.skip_sleep);
    }

    #[tokio::test]
    async fn empty_image_fails_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        seed(&config, 3, "v1");

        let outcome = rollout(&config, &id(), "", shutdown::never()).await.unwrap();

        assert!(outcome.error().is_some());
        let stored = open_store(&config).unwrap().get_workload(&id()).unwrap().unwrap();
        assert_eq!(stored.metadata.resource_version, 1);
    }

    #[tokio::test]
    async fn missing_workload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let outcome = rollout(&config, &id(), "v2", shutdown::never()).await.unwrap();

        assert!(outcome.error().unwrap().is_not_found());
    }
}
