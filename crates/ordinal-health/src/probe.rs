//! Cluster health gate: HTTP probes against every replica's address.
//!
//! A checkpoint runs rounds. Each round re-reads the workload set and probes
//! every replica; the round is healthy only when every replica reports an
//! address and answers 2xx. Rounds feed a [`HealthTracker`]; the checkpoint
//! passes on `healthy_threshold` healthy rounds in a row and fails on
//! `unhealthy_threshold` bad ones.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use ordinal_rollout::{HealthProbe, Shutdown, shutdown};
use ordinal_state::{WorkloadId, WorkloadStore};

use crate::checker::{HealthStatus, HealthTracker, ProbeResult, http_probe};
use crate::settings::HealthSettings;

pub struct HttpClusterProbe {
    store: Arc<dyn WorkloadStore>,
    id: WorkloadId,
    settings: HealthSettings,
}

impl HttpClusterProbe {
    pub fn new(store: Arc<dyn WorkloadStore>, id: WorkloadId, settings: HealthSettings) -> Self {
        Self {
            store,
            id,
            settings,
        }
    }

    /// Probe every replica once. The first bad replica decides the round.
    async fn round(&self) -> ProbeResult {
        let workload = match self.store.get(&self.id).await {
            Ok(w) => w,
            Err(e) => {
                warn!(id = %self.id, error = %e, "cannot read workload set for health round");
                return ProbeResult::Failed;
            }
        };

        for ordinal in 0..workload.spec.replicas {
            let Some(address) = workload
                .status
                .replica(ordinal)
                .and_then(|r| r.address.as_deref())
            else {
                debug!(id = %self.id, ordinal, "replica has no address");
                return ProbeResult::Failed;
            };

            let result = http_probe(address, &self.settings.endpoint, self.settings.timeout).await;
            if result != ProbeResult::Healthy {
                debug!(id = %self.id, ordinal, %address, ?result, "replica failed health probe");
                return result;
            }
        }
        ProbeResult::Healthy
    }
}

#[async_trait]
impl HealthProbe for HttpClusterProbe {
    async fn probe(
        &self,
        shutdown: &Shutdown,
        checkpoint: &str,
        ordinal: u32,
    ) -> anyhow::Result<()> {
        let mut tracker = HealthTracker::new(&self.settings);
        let mut rounds = 0u32;

        loop {
            if shutdown::is_cancelled(shutdown) {
                bail!("cancelled while checking cluster health {checkpoint}");
            }
            rounds += 1;

            match tracker.record(self.round().await) {
                HealthStatus::Healthy => {
                    info!(%checkpoint, ordinal, rounds, "cluster is healthy");
                    return Ok(());
                }
                HealthStatus::Unhealthy => {
                    warn!(%checkpoint, ordinal, rounds, "cluster is unhealthy");
                    bail!(
                        "cluster unhealthy {checkpoint}: {} failed rounds in a row",
                        tracker.consecutive_failures()
                    );
                }
                HealthStatus::Unknown => {}
            }

            if shutdown::sleep_or_cancel(tracker.next_interval(), shutdown).await {
                bail!("cancelled while checking cluster health {checkpoint}");
            }
        }
    }
}
