//! Readiness gate backed by the workload store.

use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use ordinal_rollout::{ReadinessWait, Shutdown, shutdown};
use ordinal_state::{WorkloadId, WorkloadStore};

use crate::settings::ReadinessSettings;

/// Polls the store until every replica of one workload set reports ready.
pub struct StoreReadiness {
    store: Arc<dyn WorkloadStore>,
    id: WorkloadId,
    settings: ReadinessSettings,
}

impl StoreReadiness {
    pub fn new(store: Arc<dyn WorkloadStore>, id: WorkloadId, settings: ReadinessSettings) -> Self {
        Self {
            store,
            id,
            settings,
        }
    }
}

#[async_trait]
impl ReadinessWait for StoreReadiness {
    async fn wait_until_ready(&self, shutdown: &Shutdown) -> anyhow::Result<()> {
        let start = Instant::now();
        loop {
            let workload = self
                .store
                .get(&self.id)
                .await
                .with_context(|| format!("reading {} while waiting for readiness", self.id))?;

            if workload.all_replicas_ready() {
                debug!(id = %self.id, elapsed = ?start.elapsed(), "all replicas ready");
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed >= self.settings.timeout {
                bail!(
                    "{} of {} replicas of {} ready after {:?}",
                    workload.status.ready_replicas(),
                    workload.spec.replicas,
                    self.id,
                    elapsed
                );
            }

            debug!(
                id = %self.id,
                ready = workload.status.ready_replicas(),
                replicas = workload.spec.replicas,
                "waiting for replicas to be ready"
            );
            if shutdown::sleep_or_cancel(self.settings.poll_interval, shutdown).await {
                bail!("cancelled while waiting for {} to be ready", self.id);
            }
        }
    }
}
