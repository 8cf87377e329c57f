//! Rollout errors and store-failure classification.
//!
//! Store failures are never handed to callers raw: [`classify`] tags them
//! with an [`ErrorKind`], logs them with the workload identity, and wraps
//! them in a [`StoreFailure`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::error;

use ordinal_state::{StateError, WorkloadId};

/// Coarse classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The workload set (or something it references) does not exist.
    NotFound,
    /// Optimistic-concurrency collision.
    Conflict,
    /// Structured rejection from the store.
    Status,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Status => "status",
            ErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

/// A classified store failure for one workload set.
#[derive(Debug, Error)]
#[error("workload set {namespace}/{name}: {kind}: {source}")]
pub struct StoreFailure {
    pub kind: ErrorKind,
    pub namespace: String,
    pub name: String,
    #[source]
    pub source: StateError,
}

/// Classify a store failure, log it, and wrap it with the workload identity.
pub fn classify(err: StateError, id: &WorkloadId) -> StoreFailure {
    let kind = match &err {
        StateError::NotFound(_) => {
            error!(
                name = %id.name,
                namespace = %id.namespace,
                error = %err,
                "workload set is not found"
            );
            ErrorKind::NotFound
        }
        StateError::Conflict { .. } => {
            error!(
                name = %id.name,
                namespace = %id.namespace,
                error = %err,
                "workload set update conflicted"
            );
            ErrorKind::Conflict
        }
        StateError::Status { message, .. } => {
            error!(
                name = %id.name,
                namespace = %id.namespace,
                %message,
                "error updating workload set"
            );
            ErrorKind::Status
        }
        _ => {
            error!(
                name = %id.name,
                namespace = %id.namespace,
                error = %err,
                "error accessing workload set"
            );
            ErrorKind::Other
        }
    };
    StoreFailure {
        kind,
        namespace: id.namespace.clone(),
        name: id.name.clone(),
        source: err,
    }
}

/// Everything that can end a rollout.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error(transparent)]
    Store(#[from] StoreFailure),

    #[error("error applying transform to {namespace}/{name}")]
    Transform {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("error while waiting for all replicas to be ready before ordinal {ordinal}")]
    ReadinessWait {
        ordinal: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "ordinal {ordinal} did not verify after {attempts} attempts in {elapsed:?}"
    )]
    VerificationTimeout {
        ordinal: u32,
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: anyhow::Error,
    },

    #[error("health probe failed {checkpoint} (ordinal {ordinal})")]
    HealthProbe {
        checkpoint: String,
        ordinal: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("rollout cancelled at ordinal {ordinal}")]
    Cancelled { ordinal: u32 },

    /// A failure without an ordinal of its own, raised while handling one.
    #[error("stopped at ordinal {ordinal}")]
    AtOrdinal {
        ordinal: u32,
        #[source]
        source: Box<RolloutError>,
    },

    #[error("error applying update strategy to {namespace}/{name}")]
    Strategy {
        namespace: String,
        name: String,
        #[source]
        source: Box<RolloutError>,
    },
}

impl RolloutError {
    /// The error without the identity and ordinal wrappers.
    pub fn root(&self) -> &RolloutError {
        match self {
            RolloutError::Strategy { source, .. } | RolloutError::AtOrdinal { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    /// Store classification, looking through wrappers.
    ///
    /// Failures that did not come from the store are `Other`.
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            RolloutError::Store(failure) => failure.kind,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Ordinal the rollout stopped at, if it got that far.
    pub fn ordinal(&self) -> Option<u32> {
        match self {
            RolloutError::Strategy { source, .. } => source.ordinal(),
            RolloutError::AtOrdinal { ordinal, .. }
            | RolloutError::ReadinessWait { ordinal, .. }
            | RolloutError::VerificationTimeout { ordinal, .. }
            | RolloutError::HealthProbe { ordinal, .. }
            | RolloutError::Cancelled { ordinal } => Some(*ordinal),
            _ => None,
        }
    }

    /// Attach the ordinal being handled unless the error already names one.
    pub(crate) fn at_ordinal(self, ordinal: u32) -> Self {
        if self.ordinal().is_some() {
            return self;
        }
        RolloutError::AtOrdinal {
            ordinal,
            source: Box::new(self),
        }
    }

    pub(crate) fn in_strategy(self, id: &WorkloadId) -> Self {
        RolloutError::Strategy {
            namespace: id.namespace.clone(),
            name: id.name.clone(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> WorkloadId {
        WorkloadId::new("db", "cockroach")
    }

    #[test]
    fn classify_not_found() {
        let failure = classify(StateError::NotFound("db/cockroach".into()), &id());
        assert_eq!(failure.kind, ErrorKind::NotFound);
        assert_eq!(failure.name, "cockroach");
        assert_eq!(failure.namespace, "db");
    }

    #[test]
    fn classify_conflict() {
        let err = StateError::Conflict {
            key: "db/cockroach".into(),
            expected: 3,
            actual: 4,
        };
        assert_eq!(classify(err, &id()).kind, ErrorKind::Conflict);
    }

    #[test]
    fn classify_status_keeps_message() {
        let failure = classify(StateError::invalid("partition 9 exceeds replicas 3"), &id());
        assert_eq!(failure.kind, ErrorKind::Status);
        assert!(failure.to_string().contains("partition 9 exceeds replicas 3"));
    }

    #[test]
    fn classify_other() {
        let failure = classify(StateError::Transaction("disk on fire".into()), &id());
        assert_eq!(failure.kind, ErrorKind::Other);
        assert!(failure.to_string().starts_with("workload set db/cockroach: error"));
    }

    #[test]
    fn kind_looks_through_strategy_wrapper() {
        let inner: RolloutError =
            classify(StateError::NotFound("db/cockroach".into()), &id()).into();
        let wrapped = inner.in_strategy(&id());
        assert!(wrapped.is_not_found());
        assert!(!wrapped.is_conflict());
        assert!(matches!(wrapped.root(), RolloutError::Store(_)));
    }

    #[test]
    fn ordinal_is_reported_for_ordinal_failures() {
        let err = RolloutError::HealthProbe {
            checkpoint: "between updating replicas for cockroach".into(),
            ordinal: 1,
            source: anyhow::anyhow!("underreplicated ranges"),
        }
        .in_strategy(&id());
        assert_eq!(err.ordinal(), Some(1));
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn store_failure_at_ordinal_keeps_kind() {
        let err = RolloutError::from(classify(
            StateError::Conflict {
                key: "db/cockroach".into(),
                expected: 3,
                actual: 4,
            },
            &id(),
        ))
        .at_ordinal(2)
        .in_strategy(&id());

        assert_eq!(err.ordinal(), Some(2));
        assert!(err.is_conflict());
        assert!(matches!(err.root(), RolloutError::Store(_)));
    }

    #[test]
    fn at_ordinal_keeps_existing_ordinal() {
        let err = RolloutError::Cancelled { ordinal: 1 }.at_ordinal(2);
        assert!(matches!(err, RolloutError::Cancelled { ordinal: 1 }));
        assert_eq!(err.ordinal(), Some(1));
    }

    #[test]
    fn source_chain_is_preserved() {
        let err = RolloutError::VerificationTimeout {
            ordinal: 0,
            attempts: 4,
            elapsed: Duration::from_secs(10),
            last: anyhow::anyhow!("replica 0 runs abc, want def"),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "replica 0 runs abc, want def");
    }
}
