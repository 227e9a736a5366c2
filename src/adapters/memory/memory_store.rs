//! In-memory MemoryStore.
//!
//! Backs the CLI's `memory://` mode and the test suite. Supports fault
//! injection so callers can exercise their `StoreUnavailable` handling.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{SessionId, Timestamp, UserKey};
use crate::domain::vault::SealedBlob;
use crate::ports::{
    Embedding, MemoryStore, ProfileMatch, StoreError, StoredPlan, StoredProfile, StoredTurn,
};

/// Turns of one session plus the counter that numbers them.
#[derive(Debug, Default)]
struct SessionLog {
    last_sequence: u64,
    turns: Vec<StoredTurn>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMemoryStore {
    profiles: Arc<RwLock<HashMap<UserKey, StoredProfile>>>,
    logs: Arc<RwLock<HashMap<SessionId, SessionLog>>>,
    plans: Arc<RwLock<HashMap<UserKey, Vec<StoredPlan>>>>,
    unavailable: Arc<AtomicBool>,
    failing_appends: Arc<AtomicU32>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `count` calls to `append_turn` fail with `Unavailable`.
    pub fn fail_next_appends(&self, count: u32) {
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn turn_count(&self, session_id: &SessionId) -> usize {
        self.logs
            .read()
            .await
            .get(session_id)
            .map_or(0, |log| log.turns.len())
    }

    pub async fn plan_count(&self, user_key: &UserKey) -> usize {
        self.plans.read().await.get(user_key).map_or(0, Vec::len)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("in-memory store offline"));
        }
        Ok(())
    }

    fn take_append_failure(&self) -> bool {
        self.failing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn upsert_profile(&self, profile: StoredProfile) -> Result<(), StoreError> {
        self.check_available()?;
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_key.clone(), profile);
        Ok(())
    }

    async fn find_profile(&self, user_key: &UserKey) -> Result<Option<StoredProfile>, StoreError> {
        self.check_available()?;
        Ok(self.profiles.read().await.get(user_key).cloned())
    }

    async fn append_turn(
        &self,
        session_id: &SessionId,
        sealed: SealedBlob,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        if self.take_append_failure() {
            return Err(StoreError::unavailable("injected append failure"));
        }

        // Counter read and push happen under one write guard.
        let mut logs = self.logs.write().await;
        let log = logs.entry(*session_id).or_default();
        let sequence = log.last_sequence + 1;
        log.turns.push(StoredTurn {
            session_id: *session_id,
            sequence,
            sealed,
            created_at: Timestamp::now(),
        });
        log.last_sequence = sequence;
        Ok(sequence)
    }

    async fn list_turns(
        &self,
        session_id: &SessionId,
        after: Option<u64>,
    ) -> Result<Vec<StoredTurn>, StoreError> {
        self.check_available()?;
        let after = after.unwrap_or(0);
        let logs = self.logs.read().await;
        Ok(logs
            .get(session_id)
            .map(|log| {
                log.turns
                    .iter()
                    .filter(|t| t.sequence > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn nearest_profiles(
        &self,
        embedding: &Embedding,
        k: usize,
        exclude: Option<&UserKey>,
    ) -> Result<Vec<ProfileMatch>, StoreError> {
        self.check_available()?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let profiles = self.profiles.read().await;
        let mut matches: Vec<ProfileMatch> = profiles
            .values()
            .filter(|p| Some(&p.user_key) != exclude)
            .map(|p| ProfileMatch {
                similarity: embedding.similarity(&p.embedding),
                record: p.clone(),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.record.user_key.cmp(&b.record.user_key))
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn save_plan(&self, plan: StoredPlan) -> Result<(), StoreError> {
        self.check_available()?;
        let mut plans = self.plans.write().await;
        let history = plans.entry(plan.user_key.clone()).or_default();
        let expected = history.last().map_or(1, |p| p.version.value() + 1);
        if plan.version.value() != expected {
            return Err(StoreError::conflict(format!(
                "plan version {} for {}, expected v{}",
                plan.version,
                plan.user_key.masked(),
                expected
            )));
        }
        history.push(plan);
        Ok(())
    }

    async fn latest_plan(&self, user_key: &UserKey) -> Result<Option<StoredPlan>, StoreError> {
        self.check_available()?;
        Ok(self
            .plans
            .read()
            .await
            .get(user_key)
            .and_then(|history| history.last().cloned()))
    }

    async fn purge_user(
        &self,
        user_key: &UserKey,
        sessions: &[SessionId],
    ) -> Result<(), StoreError> {
        self.check_available()?;
        self.profiles.write().await.remove(user_key);
        self.plans.write().await.remove(user_key);
        let mut logs = self.logs.write().await;
        for session_id in sessions {
            logs.remove(session_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PlanVersion;
    use crate::domain::vault::{CryptoVault, SealContext};
    use secrecy::Secret;

    fn blob(text: &str) -> SealedBlob {
        let vault =
            CryptoVault::from_secret(&Secret::new("memory-store-secret".to_string())).unwrap();
        vault.seal(text.as_bytes(), &SealContext::custom("test")).unwrap()
    }

    fn key(k: &str) -> UserKey {
        UserKey::new(k).unwrap()
    }

    fn profile(user: &str, vector: Vec<f32>) -> StoredProfile {
        StoredProfile {
            user_key: key(user),
            sealed: blob(user),
            embedding: Embedding::new(vector),
            session_id: None,
            updated_at: Timestamp::now(),
        }
    }

    fn plan(user: &str, version: u64) -> StoredPlan {
        StoredPlan {
            user_key: key(user),
            version: PlanVersion::new(version).unwrap(),
            session_id: SessionId::new(),
            sealed: blob("plan"),
            created_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn append_assigns_consecutive_sequences_per_session() {
        let store = InMemoryMemoryStore::new();
        let a = SessionId::new();
        let b = SessionId::new();

        assert_eq!(store.append_turn(&a, blob("1")).await.unwrap(), 1);
        assert_eq!(store.append_turn(&a, blob("2")).await.unwrap(), 2);
        assert_eq!(store.append_turn(&b, blob("1")).await.unwrap(), 1);
        assert_eq!(store.append_turn(&a, blob("3")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn list_turns_is_ordered_and_resumable() {
        let store = InMemoryMemoryStore::new();
        let session = SessionId::new();
        for i in 0..5 {
            store.append_turn(&session, blob(&i.to_string())).await.unwrap();
        }

        let all = store.list_turns(&session, None).await.unwrap();
        let seqs: Vec<u64> = all.iter().map(|t| t.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);

        let rest = store.list_turns(&session, Some(3)).await.unwrap();
        assert_eq!(rest.iter().map(|t| t.sequence).collect::<Vec<_>>(), vec![4, 5]);

        assert!(store.list_turns(&SessionId::new(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_never_share_a_sequence() {
        let store = InMemoryMemoryStore::new();
        let session = SessionId::new();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append_turn(&session, blob(&i.to_string())).await })
            })
            .collect();

        let mut seqs = Vec::new();
        for h in handles {
            seqs.push(h.await.unwrap().unwrap());
        }
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=32).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn upsert_replaces_the_single_profile() {
        let store = InMemoryMemoryStore::new();
        store.upsert_profile(profile("aa", vec![1.0, 0.0])).await.unwrap();
        store.upsert_profile(profile("aa", vec![0.0, 1.0])).await.unwrap();

        assert_eq!(store.profile_count().await, 1);
        let found = store.find_profile(&key("aa")).await.unwrap().unwrap();
        assert_eq!(found.embedding.as_slice(), &[0.0, 1.0]);
        assert!(store.find_profile(&key("bb")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nearest_profiles_ranks_and_excludes() {
        let store = InMemoryMemoryStore::new();
        store.upsert_profile(profile("aa", vec![1.0, 0.0])).await.unwrap();
        store.upsert_profile(profile("bb", vec![0.9, 0.1])).await.unwrap();
        store.upsert_profile(profile("cc", vec![0.0, 1.0])).await.unwrap();

        let query = Embedding::new(vec![1.0, 0.0]);
        let hits = store.nearest_profiles(&query, 2, Some(&key("aa"))).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.user_key, key("bb"));
        assert_eq!(hits[1].record.user_key, key("cc"));
        assert!(hits[0].similarity > hits[1].similarity);
        assert!(store.nearest_profiles(&query, 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn plan_versions_must_be_consecutive() {
        let store = InMemoryMemoryStore::new();
        assert!(matches!(
            store.save_plan(plan("aa", 2)).await,
            Err(StoreError::Conflict(_))
        ));
        store.save_plan(plan("aa", 1)).await.unwrap();
        assert!(store.save_plan(plan("aa", 1)).await.is_err());
        store.save_plan(plan("aa", 2)).await.unwrap();

        let latest = store.latest_plan(&key("aa")).await.unwrap().unwrap();
        assert_eq!(latest.version.value(), 2);
        assert_eq!(store.plan_count(&key("aa")).await, 2);
    }

    #[tokio::test]
    async fn purge_removes_everything_for_the_user() {
        let store = InMemoryMemoryStore::new();
        let session = SessionId::new();
        store.upsert_profile(profile("aa", vec![1.0])).await.unwrap();
        store.save_plan(plan("aa", 1)).await.unwrap();
        store.append_turn(&session, blob("t")).await.unwrap();

        store.purge_user(&key("aa"), &[session]).await.unwrap();

        assert!(store.find_profile(&key("aa")).await.unwrap().is_none());
        assert!(store.latest_plan(&key("aa")).await.unwrap().is_none());
        assert_eq!(store.turn_count(&session).await, 0);
    }

    #[tokio::test]
    async fn injected_faults_surface_as_unavailable() {
        let store = InMemoryMemoryStore::new();
        let session = SessionId::new();

        store.fail_next_appends(1);
        let err = store.append_turn(&session, blob("x")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.append_turn(&session, blob("x")).await.unwrap(), 1);

        store.set_unavailable(true);
        assert!(store.find_profile(&key("aa")).await.is_err());
        store.set_unavailable(false);
        assert!(store.find_profile(&key("aa")).await.is_ok());
    }
}
