use std::path::Path;

use anyhow::{Context, bail};
use tracing::info;

use ordinal_core::OrdinalConfig;
use ordinal_state::{ReplicaStatus, WorkloadId, WorkloadSet};

use super::open_store;

/// Observed state of one replica, as reported by whatever runs it.
#[derive(Debug, Clone)]
pub struct ReplicaReport {
    pub ordinal: u32,
    /// `None` means the revision of the stored template, which only ordinals
    /// at or above the partition are guaranteed to run.
    pub revision: Option<String>,
    pub ready: bool,
    pub address: Option<String>,
}

pub fn apply(config: &OrdinalConfig, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let workload: WorkloadSet = serde_json::from_str(&content)
        .with_context(|| format!("parsing workload set from {}", file.display()))?;

    let stored = open_store(config)?.put_workload(&workload)?;
    info!(
        id = %stored.id(),
        resource_version = stored.metadata.resource_version,
        generation = stored.metadata.generation,
        "workload set applied"
    );
    println!(
        "applied {} (resource version {})",
        stored.id(),
        stored.metadata.resource_version
    );
    Ok(())
}

pub fn status(config: &OrdinalConfig, id: &WorkloadId) -> anyhow::Result<()> {
    let Some(workload) = open_store(config)?.get_workload(id)? else {
        bail!("workload set {id} not found");
    };
    println!("{}", serde_json::to_string_pretty(&workload)?);
    Ok(())
}

pub fn report(config: &OrdinalConfig, id: &WorkloadId, report: ReplicaReport) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let Some(current) = store.get_workload(id)? else {
        bail!("workload set {id} not found");
    };
    if report.ordinal >= current.spec.replicas {
        bail!(
            "ordinal {} out of range for {id} with {} replicas",
            report.ordinal,
            current.spec.replicas
        );
    }

    let partition = current.partition().unwrap_or(0);
    let revision = match report.revision {
        Some(revision) => revision,
        None if report.ordinal < partition => bail!(
            "ordinal {} is below partition {partition} of {id} and may run an older template; pass --revision",
            report.ordinal
        ),
        None => current.update_revision(),
    };
    let stored = store.update_status(id, |status| {
        let observed = ReplicaStatus {
            ordinal: report.ordinal,
            revision,
            ready: report.ready,
            address: report.address,
        };
        match status.replica_mut(report.ordinal) {
            Some(replica) => *replica = observed,
            None => {
                status.replicas.push(observed);
                status.replicas.sort_by_key(|r| r.ordinal);
            }
        }
    })?;

    info!(
        %id,
        ordinal = report.ordinal,
        ready = report.ready,
        ready_replicas = stored.status.ready_replicas(),
        "replica status recorded"
    );
    Ok(())
}
