//! Domain types for the ordinal state store.
//!
//! A `WorkloadSet` is an ordered set of `replicas` numbered slots. Slots at or
//! above `spec.update_strategy.partition` run the current template; slots
//! below it keep whatever they ran before. All types are serializable to/from
//! JSON for storage in redb tables.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of a workload set: `{namespace}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadId {
    pub namespace: String,
    pub name: String,
}

impl WorkloadId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the composite key for the workloads table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── Workload set ──────────────────────────────────────────────────

/// The orchestrated resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadSet {
    pub metadata: ObjectMeta,
    pub spec: WorkloadSpec,
    #[serde(default)]
    pub status: WorkloadStatus,
}

/// Store-managed bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    /// Bumped by the store on every successful write. Updates carrying an
    /// older value are rejected with a conflict.
    #[serde(default)]
    pub resource_version: u64,
    /// Bumped by the store whenever the spec changes.
    #[serde(default)]
    pub generation: u64,
}

/// Desired state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadSpec {
    pub replicas: u32,
    pub template: InstanceTemplate,
    #[serde(default)]
    pub update_strategy: RollingUpdate,
}

/// Rolling update parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RollingUpdate {
    /// Ordinals `>= partition` are updated to the current template.
    /// `None` behaves like `Some(0)`.
    pub partition: Option<u32>,
}

/// What every replica runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceTemplate {
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl InstanceTemplate {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Short content hash identifying this template.
    ///
    /// Replicas report the revision they run, so two templates with the same
    /// revision are interchangeable.
    pub fn revision(&self) -> String {
        let mut hasher = Sha256::new();
        // Fields serialize in declaration order and `env` is sorted, so the
        // JSON is canonical. Every field is a string, and writing into a
        // hasher cannot fail.
        let _ = serde_json::to_writer(&mut hasher, self);
        let digest = hex::encode(hasher.finalize());
        digest[..10].to_string()
    }
}

/// Observed state, written by whatever runs the replicas.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkloadStatus {
    pub observed_generation: u64,
    pub replicas: Vec<ReplicaStatus>,
}

/// Observed state of one replica slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicaStatus {
    pub ordinal: u32,
    /// Template revision the replica currently runs.
    pub revision: String,
    pub ready: bool,
    /// `host:port` the replica serves health checks on.
    #[serde(default)]
    pub address: Option<String>,
}

impl WorkloadStatus {
    pub fn replica(&self, ordinal: u32) -> Option<&ReplicaStatus> {
        self.replicas.iter().find(|r| r.ordinal == ordinal)
    }

    pub fn replica_mut(&mut self, ordinal: u32) -> Option<&mut ReplicaStatus> {
        self.replicas.iter_mut().find(|r| r.ordinal == ordinal)
    }

    pub fn ready_replicas(&self) -> u32 {
        self.replicas.iter().filter(|r| r.ready).count() as u32
    }
}

impl WorkloadSpec {
    /// Reject specs the store must never accept.
    pub fn validate(&self) -> Result<(), String> {
        if self.template.image.trim().is_empty() {
            return Err("template.image must not be empty".to_string());
        }
        if let Some(partition) = self.update_strategy.partition {
            if self.replicas == 0 {
                return Err(format!(
                    "partition {partition} set on a workload set with no replicas"
                ));
            }
            if partition > self.replicas {
                return Err(format!(
                    "partition {partition} exceeds replicas {}",
                    self.replicas
                ));
            }
        }
        Ok(())
    }
}

impl WorkloadSet {
    /// A fresh workload set with no recorded status.
    pub fn new(id: &WorkloadId, replicas: u32, template: InstanceTemplate) -> Self {
        Self {
            metadata: ObjectMeta {
                namespace: id.namespace.clone(),
                name: id.name.clone(),
                resource_version: 0,
                generation: 0,
            },
            spec: WorkloadSpec {
                replicas,
                template,
                update_strategy: RollingUpdate::default(),
            },
            status: WorkloadStatus::default(),
        }
    }

    pub fn id(&self) -> WorkloadId {
        WorkloadId::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Build the composite key for the workloads table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }

    pub fn partition(&self) -> Option<u32> {
        self.spec.update_strategy.partition
    }

    pub fn set_partition(&mut self, partition: u32) {
        self.spec.update_strategy.partition = Some(partition);
    }

    /// Revision of the template replicas at or above the partition should run.
    pub fn update_revision(&self) -> String {
        self.spec.template.revision()
    }

    /// Every ordinal in `0..replicas` has reported in and is ready.
    pub fn all_replicas_ready(&self) -> bool {
        (0..self.spec.replicas).all(|ordinal| {
            self.status
                .replica(ordinal)
                .is_some_and(|replica| replica.ready)
        })
    }
}
