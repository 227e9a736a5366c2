//! Memory store port.
//!
//! One contract over both halves of user memory:
//!
//! - **semantic**: sealed profiles with their embeddings, searchable by
//!   nearest neighbour
//! - **structured**: append-only turn records per session and versioned
//!   plan snapshots per user
//!
//! Stores only ever see sealed blobs, storage keys and embeddings. They
//! never decrypt anything.

use async_trait::async_trait;

use super::{Embedding, StoreError};
use crate::domain::foundation::{PlanVersion, SessionId, Timestamp, UserKey};
use crate::domain::vault::SealedBlob;

/// A sealed profile as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProfile {
    pub user_key: UserKey,
    pub sealed: SealedBlob,
    pub embedding: Embedding,
    /// Session whose turn last wrote this profile.
    pub session_id: Option<SessionId>,
    pub updated_at: Timestamp,
}

/// A sealed turn with the sequence number the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTurn {
    pub session_id: SessionId,
    pub sequence: u64,
    pub sealed: SealedBlob,
    pub created_at: Timestamp,
}

/// A sealed plan snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPlan {
    pub user_key: UserKey,
    pub version: PlanVersion,
    /// Session whose turn produced this plan.
    pub session_id: SessionId,
    pub sealed: SealedBlob,
    pub created_at: Timestamp,
}

/// A nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatch {
    pub record: StoredProfile,
    pub similarity: f32,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Inserts or replaces the single profile row for `profile.user_key`.
    async fn upsert_profile(&self, profile: StoredProfile) -> Result<(), StoreError>;

    async fn find_profile(&self, user_key: &UserKey) -> Result<Option<StoredProfile>, StoreError>;

    /// Appends a turn and returns its sequence number.
    ///
    /// Sequence numbers start at 1 and increase by exactly one per append
    /// within a session, even under concurrent callers.
    async fn append_turn(&self, session_id: &SessionId, sealed: SealedBlob)
        -> Result<u64, StoreError>;

    /// Turns of a session in sequence order.
    ///
    /// `after` resumes a listing: only turns with a greater sequence are
    /// returned.
    async fn list_turns(
        &self,
        session_id: &SessionId,
        after: Option<u64>,
    ) -> Result<Vec<StoredTurn>, StoreError>;

    /// Up to `k` profiles ranked by descending similarity to `embedding`.
    async fn nearest_profiles(
        &self,
        embedding: &Embedding,
        k: usize,
        exclude: Option<&UserKey>,
    ) -> Result<Vec<ProfileMatch>, StoreError>;

    /// Stores a plan snapshot.
    ///
    /// # Errors
    ///
    /// `Conflict` unless `plan.version` is exactly one past the latest
    /// stored version for the user (or 1 when there is none).
    async fn save_plan(&self, plan: StoredPlan) -> Result<(), StoreError>;

    async fn latest_plan(&self, user_key: &UserKey) -> Result<Option<StoredPlan>, StoreError>;

    /// Hard-deletes the profile, plans, and the turns of `sessions`.
    async fn purge_user(&self, user_key: &UserKey, sessions: &[SessionId])
        -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn MemoryStore) {}
    }
}
