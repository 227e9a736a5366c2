//! Session aggregate entity.
//!
//! A session scopes encryption keys and lifecycle for one stretch of a
//! user's conversation. Turns reference the session by id; the session
//! itself holds only its status and its wrapped secret.

use crate::domain::foundation::{
    DomainError, ErrorCode, SessionId, SessionStatus, StateMachine, Timestamp, UserKey,
};
use crate::domain::vault::SealedBlob;

/// Session aggregate.
///
/// # Invariants
///
/// - `id` is globally unique
/// - `user_key` is the vault-derived storage key, never the raw identifier
/// - only `Active` sessions accept new turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    user_key: UserKey,
    status: SessionStatus,
    wrapped_secret: SealedBlob,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Session {
    /// Create a new active session.
    pub fn new(id: SessionId, user_key: UserKey, wrapped_secret: SealedBlob) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            user_key,
            status: SessionStatus::Active,
            wrapped_secret,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitute a session from persistence (no validation).
    pub fn reconstitute(
        id: SessionId,
        user_key: UserKey,
        status: SessionStatus,
        wrapped_secret: SealedBlob,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_key,
            status,
            wrapped_secret,
            created_at,
            updated_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn wrapped_secret(&self) -> &SealedBlob {
        &self.wrapped_secret
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Bytes covered by the session record's integrity tag.
    ///
    /// Covers every field a store could tamper with outside the sealed secret.
    pub fn fingerprint(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.id,
            self.user_key,
            self.status.as_str(),
            self.created_at.to_rfc3339(),
            self.updated_at.to_rfc3339()
        )
        .into_bytes()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Mark the session cleared. History stays, writes stop.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` unless the session is active
    pub fn clear(&mut self) -> Result<(), DomainError> {
        self.transition(SessionStatus::Cleared)
    }

    /// Close the session for good.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` unless the session is active
    pub fn close(&mut self) -> Result<(), DomainError> {
        self.transition(SessionStatus::Closed)
    }

    /// Validates that turns may be appended.
    ///
    /// # Errors
    ///
    /// - `SessionNotWritable` for cleared or closed sessions
    pub fn ensure_writable(&self) -> Result<(), DomainError> {
        if self.status.is_writable() {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::SessionNotWritable,
                format!("Session is {}", self.status),
            ))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn transition(&mut self, target: SessionStatus) -> Result<(), DomainError> {
        let from = self.status;
        self.status = from.transition_to(target).map_err(|e| {
            DomainError::new(ErrorCode::InvalidStateTransition, e.to_string())
                .with_detail("from", from.as_str())
                .with_detail("to", target.as_str())
        })?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vault::{NONCE_LEN, TAG_LEN};

    fn test_session() -> Session {
        Session::new(
            SessionId::new(),
            UserKey::new("abcdef0123").unwrap(),
            SealedBlob::from_bytes(&[0u8; NONCE_LEN + TAG_LEN + 32]).unwrap(),
        )
    }

    #[test]
    fn new_session_is_active_and_writable() {
        let session = test_session();
        assert_eq!(session.status(), SessionStatus::Active);
        assert!(session.ensure_writable().is_ok());
    }

    #[test]
    fn clear_stops_writes() {
        let mut session = test_session();
        session.clear().unwrap();
        assert_eq!(session.status(), SessionStatus::Cleared);
        let err = session.ensure_writable().unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionNotWritable);
    }

    #[test]
    fn close_is_terminal() {
        let mut session = test_session();
        session.close().unwrap();
        assert!(session.clear().is_err());
        assert!(session.close().is_err());
    }

    #[test]
    fn cleared_session_cannot_be_closed() {
        let mut session = test_session();
        session.clear().unwrap();
        let err = session.close().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(err.details.get("from"), Some(&"cleared".to_string()));
    }

    #[test]
    fn fingerprint_changes_with_status() {
        let mut session = test_session();
        let before = session.fingerprint();
        session.clear().unwrap();
        assert_ne!(before, session.fingerprint());
    }
}
