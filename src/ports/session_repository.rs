//! Session repository port.
//!
//! Persists session records. Each record carries an integrity tag over the
//! session's fingerprint so that edits made behind the application's back
//! are detected on load.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::foundation::{SessionId, UserKey};
use crate::domain::session::Session;
use crate::domain::vault::RecordTag;

/// A session together with its integrity tag.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session: Session,
    pub tag: RecordTag,
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts a new session.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the id exists, or if the user already has an active
    ///   session and the new one is active too
    async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Replaces an existing record.
    ///
    /// # Errors
    ///
    /// - `Conflict` if no record with this id exists
    async fn update(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;

    async fn find_active_for_user(
        &self,
        user_key: &UserKey,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// All sessions of a user, newest first.
    async fn list_for_user(&self, user_key: &UserKey) -> Result<Vec<SessionRecord>, StoreError>;

    /// Most recently updated sessions across all users.
    async fn list_all(&self, limit: usize) -> Result<Vec<SessionRecord>, StoreError>;

    /// Deletes every session of a user and returns how many were removed.
    async fn delete_for_user(&self, user_key: &UserKey) -> Result<u64, StoreError>;
}
