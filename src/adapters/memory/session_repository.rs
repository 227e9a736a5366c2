//! In-memory SessionRepository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{SessionId, UserKey};
use crate::ports::{SessionRecord, SessionRepository, StoreError};

#[derive(Debug, Clone, Default)]
pub struct InMemorySessionRepository {
    records: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
    failing_updates: Arc<AtomicU32>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Makes the next `count` calls to `update` fail with `Unavailable`.
    pub fn fail_next_updates(&self, count: u32) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    fn take_update_failure(&self) -> bool {
        self.failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Overwrites a record without any checks, for tamper tests.
    pub async fn put_raw(&self, record: SessionRecord) {
        self.records
            .write()
            .await
            .insert(*record.session.id(), record);
    }
}

fn newest_first(records: &mut [SessionRecord]) {
    records.sort_by(|a, b| {
        b.session
            .updated_at()
            .cmp(a.session.updated_at())
            .then_with(|| b.session.created_at().cmp(a.session.created_at()))
    });
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let id = *record.session.id();
        if records.contains_key(&id) {
            return Err(StoreError::conflict(format!("session {} exists", id.masked())));
        }
        if record.session.is_active()
            && records.values().any(|r| {
                r.session.user_key() == record.session.user_key() && r.session.is_active()
            })
        {
            return Err(StoreError::conflict(format!(
                "user {} already has an active session",
                record.session.user_key().masked()
            )));
        }
        records.insert(id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &SessionRecord) -> Result<(), StoreError> {
        if self.take_update_failure() {
            return Err(StoreError::unavailable("injected update failure"));
        }
        let mut records = self.records.write().await;
        match records.get_mut(record.session.id()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::conflict(format!(
                "session {} does not exist",
                record.session.id().masked()
            ))),
        }
    }

    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_active_for_user(
        &self,
        user_key: &UserKey,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.session.user_key() == user_key && r.session.is_active())
            .cloned())
    }

    async fn list_for_user(&self, user_key: &UserKey) -> Result<Vec<SessionRecord>, StoreError> {
        let mut found: Vec<SessionRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.session.user_key() == user_key)
            .cloned()
            .collect();
        newest_first(&mut found);
        Ok(found)
    }

    async fn list_all(&self, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
        let mut all: Vec<SessionRecord> = self.records.read().await.values().cloned().collect();
        newest_first(&mut all);
        all.truncate(limit);
        Ok(all)
    }

    async fn delete_for_user(&self, user_key: &UserKey) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.session.user_key() != user_key);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::Session;
    use crate::domain::vault::{CryptoVault, RecordTag, SealContext};
    use secrecy::Secret;

    fn record(user: &str) -> SessionRecord {
        let vault = CryptoVault::from_secret(&Secret::new("repo-test-secret-xyz".to_string())).unwrap();
        let id = SessionId::new();
        let wrapped = vault.seal(b"secret", &SealContext::session_secret(&id)).unwrap();
        let session = Session::new(id, UserKey::new(user).unwrap(), wrapped);
        SessionRecord {
            session,
            tag: RecordTag::from_hex("00"),
        }
    }

    #[tokio::test]
    async fn second_active_session_for_user_conflicts() {
        let repo = InMemorySessionRepository::new();
        repo.insert(&record("aa")).await.unwrap();

        let err = repo.insert(&record("aa")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        repo.insert(&record("bb")).await.unwrap();
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn closed_session_frees_the_active_slot() {
        let repo = InMemorySessionRepository::new();
        let mut first = record("aa");
        repo.insert(&first).await.unwrap();

        first.session.close().unwrap();
        repo.update(&first).await.unwrap();

        assert!(repo.find_active_for_user(&UserKey::new("aa").unwrap()).await.unwrap().is_none());
        repo.insert(&record("aa")).await.unwrap();
        assert_eq!(repo.list_for_user(&UserKey::new("aa").unwrap()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let repo = InMemorySessionRepository::new();
        assert!(repo.update(&record("aa")).await.is_err());
    }

    #[tokio::test]
    async fn delete_for_user_counts_removed() {
        let repo = InMemorySessionRepository::new();
        let mut first = record("aa");
        repo.insert(&first).await.unwrap();
        first.session.clear().unwrap();
        repo.update(&first).await.unwrap();
        repo.insert(&record("aa")).await.unwrap();
        repo.insert(&record("bb")).await.unwrap();

        assert_eq!(repo.delete_for_user(&UserKey::new("aa").unwrap()).await.unwrap(), 2);
        assert_eq!(repo.list_all(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_all_respects_limit() {
        let repo = InMemorySessionRepository::new();
        for user in ["aa", "bb", "cc"] {
            repo.insert(&record(user)).await.unwrap();
        }
        assert_eq!(repo.list_all(2).await.unwrap().len(), 2);
        assert!(!repo.is_empty().await);
    }
}
