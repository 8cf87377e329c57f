//! Error types for the ordinal state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The caller's copy is stale: someone else wrote in between.
    #[error(
        "conflict on {key}: the object has been modified (expected resource version {expected}, found {actual})"
    )]
    Conflict { key: String, expected: u64, actual: u64 },

    /// Structured rejection from the store (validation and the like).
    #[error("{reason} ({code}): {message}")]
    Status {
        code: u16,
        reason: String,
        message: String,
    },
}

impl StateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StateError::Conflict { .. })
    }

    /// Build a 422 `Invalid` status error.
    pub fn invalid(message: impl Into<String>) -> Self {
        StateError::Status {
            code: 422,
            reason: "Invalid".to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(StateError::NotFound("a/b".into()).is_not_found());
        assert!(
            StateError::Conflict {
                key: "a/b".into(),
                expected: 1,
                actual: 2
            }
            .is_conflict()
        );
        assert!(!StateError::invalid("bad").is_conflict());
    }

    #[test]
    fn status_display_carries_message() {
        let err = StateError::invalid("partition 5 exceeds replicas 3");
        assert_eq!(
            err.to_string(),
            "Invalid (422): partition 5 exceeds replicas 3"
        );
    }
}
