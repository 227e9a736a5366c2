//! CoachService - the entry point the CLI talks to.
//!
//! Resolves sessions through the [`SessionManager`] and hands turns to the
//! [`WorkflowEngine`]. Callers keep the returned [`SessionHandle`] for the
//! life of a conversation and open a new one after `clear`.

use std::sync::Arc;

use super::session_manager::{PurgeReport, ResolvedSession, SessionHandle, SessionManager};
use super::workflow::{TurnReport, WorkflowEngine, WorkflowError};
use crate::domain::foundation::UserId;
use crate::domain::plan::Plan;
use crate::domain::session::{Session, SessionError};
use crate::domain::turn::{RecordedTurn, TurnInput};

pub struct CoachService {
    sessions: Arc<SessionManager>,
    engine: Arc<WorkflowEngine>,
}

impl CoachService {
    pub fn new(sessions: Arc<SessionManager>, engine: Arc<WorkflowEngine>) -> Self {
        Self { sessions, engine }
    }

    /// Resolves (or creates) the user's active session.
    pub async fn open(&self, user_id: &UserId) -> Result<ResolvedSession, SessionError> {
        let resolved = self.sessions.resolve(user_id).await?;
        if resolved.interrupted_turn {
            tracing::warn!(
                session_id = %resolved.handle.id().masked(),
                "resuming after an incomplete turn"
            );
        }
        Ok(resolved)
    }

    pub async fn request(
        &self,
        handle: &SessionHandle,
        text: &str,
    ) -> Result<TurnReport, WorkflowError> {
        let input =
            TurnInput::request(text).map_err(|e| WorkflowError::InvalidInput(e.message))?;
        self.engine.run_turn(handle, input).await
    }

    pub async fn weekly_update(
        &self,
        handle: &SessionHandle,
        text: &str,
    ) -> Result<TurnReport, WorkflowError> {
        let input =
            TurnInput::weekly_update(text).map_err(|e| WorkflowError::InvalidInput(e.message))?;
        self.engine.run_turn(handle, input).await
    }

    pub async fn history(&self, handle: &SessionHandle) -> Result<Vec<RecordedTurn>, SessionError> {
        self.sessions.history(handle).await
    }

    /// The plan cached by this session, or the latest stored one.
    pub async fn current_plan(&self, handle: &SessionHandle) -> Result<Option<Plan>, WorkflowError> {
        if let Some(plan) = handle.lock().await.plan.clone() {
            return Ok(Some(plan));
        }
        self.engine.current_plan(handle.user_key()).await
    }

    pub async fn clear(&self, handle: &SessionHandle) -> Result<Session, SessionError> {
        self.sessions.clear(handle.id()).await
    }

    pub async fn close(&self, handle: &SessionHandle) -> Result<Session, SessionError> {
        self.sessions.close(handle.id()).await
    }

    pub async fn purge(&self, user_id: &UserId) -> Result<PurgeReport, SessionError> {
        self.sessions.purge_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockAIProvider;
    use crate::adapters::embedding::HashingEmbedder;
    use crate::adapters::memory::{InMemoryMemoryStore, InMemorySessionRepository};
    use crate::application::workflow::RetryPolicy;
    use crate::domain::foundation::SessionStatus;
    use crate::domain::vault::CryptoVault;
    use secrecy::Secret;

    fn service() -> CoachService {
        let vault =
            Arc::new(CryptoVault::from_secret(&Secret::new("coach-service-secret".into())).unwrap());
        let store = Arc::new(InMemoryMemoryStore::new());
        let sessions = Arc::new(SessionManager::new(
            vault.clone(),
            Arc::new(InMemorySessionRepository::new()),
            store.clone(),
        ));
        let engine = Arc::new(WorkflowEngine::new(
            vault,
            store,
            Arc::new(HashingEmbedder::new(32)),
            Arc::new(MockAIProvider::new()),
            RetryPolicy::default(),
        ));
        CoachService::new(sessions, engine)
    }

    #[tokio::test]
    async fn blank_request_is_invalid_input() {
        let s = service();
        let handle = s.open(&UserId::new("svc").unwrap()).await.unwrap().handle;
        let err = s.request(&handle, "   ").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn no_plan_before_the_first_turn() {
        let s = service();
        let handle = s.open(&UserId::new("svc").unwrap()).await.unwrap().handle;
        assert!(s.current_plan(&handle).await.unwrap().is_none());
        assert!(s.history(&handle).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_then_open_gives_a_new_session() {
        let s = service();
        let user = UserId::new("svc").unwrap();
        let first = s.open(&user).await.unwrap().handle;
        assert_eq!(s.clear(&first).await.unwrap().status(), SessionStatus::Cleared);
        let second = s.open(&user).await.unwrap();
        assert!(second.created);
        assert_ne!(second.handle.id(), first.id());
    }
}
