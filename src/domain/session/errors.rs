//! Session-specific error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId};
use crate::domain::vault::VaultError;
use crate::ports::StoreError;

/// Errors from session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {}", .0.masked())]
    NotFound(SessionId),

    #[error("session is not writable: {0}")]
    NotWritable(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::NotFound(_) => ErrorCode::SessionNotFound,
            SessionError::NotWritable(_) => ErrorCode::SessionNotWritable,
            SessionError::InvalidState(_) => ErrorCode::InvalidStateTransition,
            SessionError::Validation(_) => ErrorCode::ValidationFailed,
            SessionError::Store(e) => e.code(),
            SessionError::Vault(VaultError::Integrity { .. }) => ErrorCode::IntegrityViolation,
            SessionError::Vault(_) => ErrorCode::InternalError,
        }
    }
}

impl From<DomainError> for SessionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::SessionNotWritable => SessionError::NotWritable(err.message),
            ErrorCode::InvalidStateTransition => SessionError::InvalidState(err.message),
            _ => SessionError::Validation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_session_errors() {
        let err: SessionError =
            DomainError::new(ErrorCode::SessionNotWritable, "Session is CLEARED").into();
        assert!(matches!(err, SessionError::NotWritable(_)));
        assert_eq!(err.code(), ErrorCode::SessionNotWritable);
    }

    #[test]
    fn integrity_failures_keep_their_code() {
        let err = SessionError::from(VaultError::integrity("session-secret"));
        assert_eq!(err.code(), ErrorCode::IntegrityViolation);
    }

    #[test]
    fn not_found_message_masks_id() {
        let id = SessionId::new();
        let msg = SessionError::NotFound(id).to_string();
        assert!(!msg.contains(&id.to_string()));
    }
}
