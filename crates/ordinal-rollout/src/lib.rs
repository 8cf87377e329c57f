//! Ordinal partitioned rolling updates.
//!
//! Rolls a new instance template out to an ordered set of replicas one
//! ordinal at a time, highest ordinal first, by lowering the workload set's
//! partition. Each step is gated on replica readiness before and cluster
//! health after, and verified by polling with exponential backoff.
//!
//! # Components
//!
//! - **`controller`**: fetch, transform, hand off to a strategy
//! - **`strategy`**: the partitioned ordinal-by-ordinal strategy
//! - **`conflict`**: bounded retry of updates across version conflicts
//! - **`poller`**: exponential-backoff verification polling
//! - **`verify`**: revision-based replica verification
//! - **`capability`**: the injected traits the pieces are built from

pub mod capability;
pub mod conflict;
pub mod context;
pub mod controller;
pub mod error;
pub mod poller;
pub mod shutdown;
pub mod strategy;
pub mod transform;
pub mod verify;

pub use capability::{HealthProbe, ReadinessWait, ReplicaVerifier, UpdateStrategy, WorkloadTransform};
pub use conflict::{ConflictRetry, update_with_conflict_retry};
pub use context::{RolloutContext, RolloutGates, RolloutOutcome, TimingConfig};
pub use controller::{RolloutController, UpdateSuite};
pub use error::{ErrorKind, RolloutError, StoreFailure, classify};
pub use poller::{ExponentialBackoff, PollError, poll_until};
pub use shutdown::Shutdown;
pub use strategy::PartitionedRollingUpdate;
pub use transform::SetImage;
pub use verify::RevisionVerifier;
