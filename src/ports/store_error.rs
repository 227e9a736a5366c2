//! Error type shared by the storage ports.

use thiserror::Error;

use crate::domain::foundation::ErrorCode;

/// Failures reported by [`MemoryStore`](super::MemoryStore) and
/// [`SessionRepository`](super::SessionRepository) implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend I/O failed; the operation may succeed if retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write collided with existing state (duplicate key, stale version).
    #[error("store conflict: {0}")]
    Conflict(String),

    /// Stored data does not match what the caller expects.
    #[error("store integrity violation: {0}")]
    Integrity(String),

    #[error("store serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        StoreError::Conflict(message.into())
    }

    /// Only I/O failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Unavailable(_) => ErrorCode::DatabaseError,
            StoreError::Conflict(_) => ErrorCode::PlanVersionConflict,
            StoreError::Integrity(_) => ErrorCode::IntegrityViolation,
            StoreError::Serialization(_) => ErrorCode::SerializationError,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Serialization(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(StoreError::unavailable("connection reset").is_retryable());
        assert!(!StoreError::conflict("duplicate").is_retryable());
        assert!(!StoreError::Integrity("bad tag".into()).is_retryable());
        assert!(!StoreError::Serialization("eof".into()).is_retryable());
    }

    #[test]
    fn pool_timeout_maps_to_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());
    }
}
