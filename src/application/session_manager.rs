//! Session Manager - session identity and lifecycle.
//!
//! Maps user identifiers to storage keys, resolves or creates the user's
//! active session, and owns the arena of live session handles. Each handle
//! carries the unwrapped session secret, the in-memory working state behind
//! its own lock, and a cancellation flag that `clear`/`close` raise before
//! waiting for an in-flight turn to let go of that lock.
//!
//! Session creation for a user is serialized through a per-user lock, so
//! concurrent `resolve` calls never produce two active sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::domain::foundation::{SessionId, SessionStatus, UserId, UserKey};
use crate::domain::plan::Plan;
use crate::domain::profile::Profile;
use crate::domain::session::{Session, SessionError};
use crate::domain::turn::{RecordedTurn, Turn};
use crate::domain::vault::{CryptoVault, SealContext, SessionSecret, VaultError};
use crate::ports::{MemoryStore, SessionRecord, SessionRepository};

/// Per-session state that lives only in memory.
#[derive(Debug)]
pub struct WorkingState {
    pub session: Session,
    /// Last profile written or read by a turn in this process.
    pub profile: Option<Profile>,
    /// Last plan written or read by a turn in this process.
    pub plan: Option<Plan>,
    pub last_sequence: Option<u64>,
}

impl WorkingState {
    fn new(session: Session) -> Self {
        Self {
            session,
            profile: None,
            plan: None,
            last_sequence: None,
        }
    }

    fn reset(&mut self) {
        self.profile = None;
        self.plan = None;
        self.last_sequence = None;
    }
}

/// A live session in the arena.
pub struct SessionHandle {
    id: SessionId,
    user_key: UserKey,
    secret: SessionSecret,
    state: Mutex<WorkingState>,
    cancelled: AtomicBool,
}

impl SessionHandle {
    fn new(session: Session, secret: SessionSecret) -> Self {
        Self {
            id: *session.id(),
            user_key: session.user_key().clone(),
            secret,
            state: Mutex::new(WorkingState::new(session)),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    pub fn secret(&self) -> &SessionSecret {
        &self.secret
    }

    /// Exclusive access to the working state. Held for the whole of a turn.
    pub async fn lock(&self) -> MutexGuard<'_, WorkingState> {
        self.state.lock().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id.masked())
            .field("user_key", &self.user_key.masked())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Result of [`SessionManager::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub handle: Arc<SessionHandle>,
    /// A new session was created by this call.
    pub created: bool,
    /// A profile or plan written by this session has no completed turn
    /// after it: the previous run stopped during memory update.
    pub interrupted_turn: bool,
}

/// Outcome of a hard delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub sessions_deleted: u64,
}

pub struct SessionManager {
    vault: Arc<CryptoVault>,
    sessions: Arc<dyn SessionRepository>,
    store: Arc<dyn MemoryStore>,
    user_locks: Mutex<HashMap<UserKey, Arc<Mutex<()>>>>,
    arena: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl SessionManager {
    pub fn new(
        vault: Arc<CryptoVault>,
        sessions: Arc<dyn SessionRepository>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            vault,
            sessions,
            store,
            user_locks: Mutex::new(HashMap::new()),
            arena: RwLock::new(HashMap::new()),
        }
    }

    pub fn user_key(&self, user_id: &UserId) -> Result<UserKey, SessionError> {
        Ok(self.vault.user_key(user_id)?)
    }

    /// Returns the user's active session, creating one if there is none.
    ///
    /// # Errors
    ///
    /// - `Vault(Integrity)` if the stored session record or its wrapped
    ///   secret fails verification
    /// - `Store` on repository failure
    pub async fn resolve(&self, user_id: &UserId) -> Result<ResolvedSession, SessionError> {
        let user_key = self.user_key(user_id)?;
        let user_lock = self.user_lock(&user_key).await;
        let _guard = user_lock.lock().await;

        if let Some(record) = self.sessions.find_active_for_user(&user_key).await? {
            let id = *record.session.id();
            if let Some(handle) = self.arena.read().await.get(&id).cloned() {
                return Ok(ResolvedSession {
                    handle,
                    created: false,
                    interrupted_turn: false,
                });
            }

            self.verify(&record)?;
            let secret = self
                .vault
                .unwrap_session_secret(&id, record.session.wrapped_secret())?;
            let handle = Arc::new(SessionHandle::new(record.session, secret));
            let interrupted_turn = self.detect_interrupted_turn(&handle).await?;
            self.arena.write().await.insert(id, handle.clone());

            tracing::info!(
                session_id = %id.masked(),
                user_key = %user_key.masked(),
                interrupted_turn,
                "resumed session"
            );
            return Ok(ResolvedSession {
                handle,
                created: false,
                interrupted_turn,
            });
        }

        let id = SessionId::new();
        let secret = SessionSecret::generate();
        let wrapped = self.vault.wrap_session_secret(&id, &secret)?;
        let session = Session::new(id, user_key.clone(), wrapped);
        let record = self.record_for(&session)?;
        self.sessions.insert(&record).await?;

        let handle = Arc::new(SessionHandle::new(session, secret));
        self.arena.write().await.insert(id, handle.clone());

        tracing::info!(
            session_id = %id.masked(),
            user_key = %user_key.masked(),
            "created session"
        );
        Ok(ResolvedSession {
            handle,
            created: true,
            interrupted_turn: false,
        })
    }

    /// Live handle for a session resolved earlier in this process.
    pub async fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.arena.read().await.get(id).cloned()
    }

    /// Marks the session cleared. Encrypted history is kept; the working
    /// state is dropped and the next `resolve` starts a fresh session.
    pub async fn clear(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.finish(id, SessionStatus::Cleared).await
    }

    /// Closes the session for good.
    pub async fn close(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.finish(id, SessionStatus::Closed).await
    }

    /// Decrypted turns of a live session, in sequence order.
    pub async fn history(&self, handle: &SessionHandle) -> Result<Vec<RecordedTurn>, SessionError> {
        let stored = self.store.list_turns(handle.id(), None).await?;
        let mut turns = Vec::with_capacity(stored.len());
        for t in stored {
            let turn = Turn::open(&t.sealed, &self.vault, handle.id(), handle.secret())?;
            turns.push(RecordedTurn {
                sequence: t.sequence,
                turn,
            });
        }
        Ok(turns)
    }

    /// Hard-deletes everything stored for a user.
    pub async fn purge_user(&self, user_id: &UserId) -> Result<PurgeReport, SessionError> {
        let user_key = self.user_key(user_id)?;
        let user_lock = self.user_lock(&user_key).await;
        let _guard = user_lock.lock().await;

        let ids: Vec<SessionId> = self
            .sessions
            .list_for_user(&user_key)
            .await?
            .iter()
            .map(|r| *r.session.id())
            .collect();

        {
            let mut arena = self.arena.write().await;
            for id in &ids {
                if let Some(handle) = arena.remove(id) {
                    handle.cancel();
                }
            }
        }

        self.store.purge_user(&user_key, &ids).await?;
        let sessions_deleted = self.sessions.delete_for_user(&user_key).await?;

        tracing::warn!(
            user_key = %user_key.masked(),
            sessions_deleted,
            "purged user data"
        );
        Ok(PurgeReport { sessions_deleted })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn finish(&self, id: &SessionId, target: SessionStatus) -> Result<Session, SessionError> {
        let live = self.arena.read().await.get(id).cloned();

        let user_key = match &live {
            Some(handle) => {
                // Let an in-flight turn stop at its next stage boundary.
                handle.cancel();
                handle.user_key().clone()
            }
            None => self.load_verified(id).await?.session.user_key().clone(),
        };

        let user_lock = self.user_lock(&user_key).await;
        let _guard = user_lock.lock().await;

        let session = match live {
            Some(handle) => {
                let mut state = handle.lock().await;
                // The live session only changes once the repository has
                // accepted the new status.
                let finished = match self.persist_transition(&state.session, target).await {
                    Ok(finished) => finished,
                    Err(err) => {
                        handle.resume();
                        tracing::warn!(
                            session_id = %id.masked(),
                            error = %err,
                            "session status not persisted; session stays active"
                        );
                        return Err(err);
                    }
                };
                state.session = finished.clone();
                state.reset();
                self.arena.write().await.remove(id);
                finished
            }
            None => {
                let session = self.load_verified(id).await?.session;
                self.persist_transition(&session, target).await?
            }
        };

        tracing::info!(session_id = %id.masked(), status = %target, "session finished");
        Ok(session)
    }

    async fn persist_transition(
        &self,
        session: &Session,
        target: SessionStatus,
    ) -> Result<Session, SessionError> {
        let mut next = session.clone();
        transition(&mut next, target)?;
        self.sessions.update(&self.record_for(&next)?).await?;
        Ok(next)
    }

    /// Per-user lock. Locks are only cloned here, under the map's own lock,
    /// so an entry the map alone holds is idle and can be dropped.
    async fn user_lock(&self, user_key: &UserKey) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.retain(|key, lock| key == user_key || Arc::strong_count(lock) > 1);
        locks.entry(user_key.clone()).or_default().clone()
    }

    async fn load_verified(&self, id: &SessionId) -> Result<SessionRecord, SessionError> {
        let record = self
            .sessions
            .find(id)
            .await?
            .ok_or(SessionError::NotFound(*id))?;
        self.verify(&record)?;
        Ok(record)
    }

    fn verify(&self, record: &SessionRecord) -> Result<(), VaultError> {
        let id = record.session.id();
        self.vault
            .verify_tag(
                &record.session.fingerprint(),
                &SealContext::session_record(id),
                &record.tag,
            )
            .map_err(|e| {
                tracing::error!(session_id = %id.masked(), "session record failed verification");
                e
            })
    }

    fn record_for(&self, session: &Session) -> Result<SessionRecord, VaultError> {
        let tag = self.vault.tag(
            &session.fingerprint(),
            &SealContext::session_record(session.id()),
        )?;
        Ok(SessionRecord {
            session: session.clone(),
            tag,
        })
    }

    /// Turns are written after the profile and plan. A plan produced in this
    /// session with no completed turn naming it, or a profile this session
    /// wrote after its last completed turn, marks a run that died during
    /// memory update.
    async fn detect_interrupted_turn(&self, handle: &SessionHandle) -> Result<bool, SessionError> {
        let user_key = handle.user_key();
        let plan = self
            .store
            .latest_plan(user_key)
            .await?
            .filter(|p| p.session_id == *handle.id());
        let profile = self
            .store
            .find_profile(user_key)
            .await?
            .filter(|p| p.session_id == Some(*handle.id()));
        if plan.is_none() && profile.is_none() {
            return Ok(false);
        }

        let completed: Vec<Turn> = self
            .history(handle)
            .await?
            .into_iter()
            .map(|t| t.turn)
            .filter(|t| t.outcome.is_completed())
            .collect();
        let orphan_plan = plan.as_ref().is_some_and(|p| {
            !completed
                .iter()
                .any(|t| t.outputs.plan_version == Some(p.version))
        });
        let orphan_profile = profile.as_ref().is_some_and(|p| {
            !completed
                .iter()
                .any(|t| !t.created_at.is_before(&p.updated_at))
        });

        if orphan_plan || orphan_profile {
            tracing::warn!(
                session_id = %handle.id().masked(),
                orphan_plan,
                orphan_profile,
                "memory written without a terminal turn; previous turn did not complete"
            );
        }
        Ok(orphan_plan || orphan_profile)
    }
}

fn transition(session: &mut Session, target: SessionStatus) -> Result<(), SessionError> {
    match target {
        SessionStatus::Cleared => session.clear()?,
        SessionStatus::Closed => session.close()?,
        SessionStatus::Active => {
            return Err(SessionError::InvalidState(
                "sessions cannot be reactivated".to_string(),
            ))
        }
    }
    Ok(())
}
