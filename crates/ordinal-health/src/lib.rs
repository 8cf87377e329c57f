//! ordinal-health: the gates a partitioned rollout waits on.
//!
//! Two implementations of the rollout crate's gate traits:
//!
//! - [`StoreReadiness`] polls the workload store until every replica
//!   reports ready.
//! - [`HttpClusterProbe`] runs rounds of HTTP health checks against every
//!   replica's reported address, with consecutive-result thresholds and
//!   exponential backoff (1s to 60s) between failed rounds.

pub mod checker;
pub mod probe;
pub mod readiness;
pub mod settings;

pub use checker::{HealthStatus, HealthTracker, ProbeResult, http_probe};
pub use probe::HttpClusterProbe;
pub use readiness::StoreReadiness;
pub use settings::{HealthSettings, ReadinessSettings};
