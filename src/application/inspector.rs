//! Inspector - developer access to stored sessions.
//!
//! Sessions are looked up by the trailing characters of their id or of
//! their owner's storage key, never by full identifiers. Listings show
//! masked ids only. With `show_full`, turns are decrypted with the
//! process vault; a record that fails to open is reported on its own and
//! does not hide the records that did open.

use std::sync::Arc;
use thiserror::Error;

use crate::domain::foundation::{SessionStatus, Timestamp, MASK_SUFFIX_LEN};
use crate::domain::session::Session;
use crate::domain::turn::Turn;
use crate::domain::vault::{CryptoVault, SealContext, VaultError};
use crate::ports::{MemoryStore, SessionRecord, SessionRepository, StoreError};

/// Sessions scanned when matching suffixes.
const SCAN_LIMIT: usize = 10_000;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("suffix must be at least {} characters", MASK_SUFFIX_LEN)]
    SuffixTooShort,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which sessions to inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectQuery {
    /// Most recently updated sessions.
    Recent,
    SessionSuffix(String),
    UserSuffix(String),
}

/// Masked view of one session record.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_key: String,
    pub status: SessionStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub turn_count: usize,
    /// Set when the record's integrity tag does not verify.
    pub integrity_error: Option<String>,
}

#[derive(Debug)]
pub struct InspectedTurn {
    pub sequence: u64,
    pub stored_at: Timestamp,
    pub content: Result<Turn, VaultError>,
}

#[derive(Debug)]
pub struct InspectedSession {
    pub summary: SessionSummary,
    /// Empty unless turns were requested.
    pub turns: Vec<InspectedTurn>,
}

pub struct Inspector {
    vault: Arc<CryptoVault>,
    sessions: Arc<dyn SessionRepository>,
    store: Arc<dyn MemoryStore>,
}

impl Inspector {
    pub fn new(
        vault: Arc<CryptoVault>,
        sessions: Arc<dyn SessionRepository>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            vault,
            sessions,
            store,
        }
    }

    pub async fn inspect(
        &self,
        query: &InspectQuery,
        show_full: bool,
        limit: usize,
    ) -> Result<Vec<InspectedSession>, InspectError> {
        let records = self.matching(query, limit).await?;
        tracing::info!(matched = records.len(), show_full, "inspecting sessions");

        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.inspect_one(&record, show_full).await?);
        }
        Ok(out)
    }

    async fn matching(
        &self,
        query: &InspectQuery,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, InspectError> {
        let records = match query {
            InspectQuery::Recent => return Ok(self.sessions.list_all(limit).await?),
            InspectQuery::SessionSuffix(suffix) => {
                check_suffix(suffix)?;
                self.sessions
                    .list_all(SCAN_LIMIT)
                    .await?
                    .into_iter()
                    .filter(|r| r.session.id().matches_suffix(suffix))
                    .collect::<Vec<_>>()
            }
            InspectQuery::UserSuffix(suffix) => {
                check_suffix(suffix)?;
                self.sessions
                    .list_all(SCAN_LIMIT)
                    .await?
                    .into_iter()
                    .filter(|r| r.session.user_key().matches_suffix(suffix))
                    .collect::<Vec<_>>()
            }
        };
        Ok(records.into_iter().take(limit).collect())
    }

    async fn inspect_one(
        &self,
        record: &SessionRecord,
        show_full: bool,
    ) -> Result<InspectedSession, InspectError> {
        let session = &record.session;
        let integrity_error = self
            .vault
            .verify_tag(
                &session.fingerprint(),
                &SealContext::session_record(session.id()),
                &record.tag,
            )
            .err()
            .map(|e| e.to_string());

        let stored = self.store.list_turns(session.id(), None).await?;
        let summary = summarize(session, stored.len(), integrity_error);
        if !show_full {
            return Ok(InspectedSession {
                summary,
                turns: Vec::new(),
            });
        }

        let secret = self
            .vault
            .unwrap_session_secret(session.id(), session.wrapped_secret());
        let turns = stored
            .into_iter()
            .map(|t| {
                let content = match &secret {
                    Ok(secret) => Turn::open(&t.sealed, &self.vault, session.id(), secret),
                    Err(e) => Err(e.clone()),
                };
                if let Err(e) = &content {
                    tracing::warn!(
                        session_id = %session.id().masked(),
                        sequence = t.sequence,
                        error = %e,
                        "turn failed to open"
                    );
                }
                InspectedTurn {
                    sequence: t.sequence,
                    stored_at: t.created_at,
                    content,
                }
            })
            .collect();

        Ok(InspectedSession { summary, turns })
    }
}

fn summarize(session: &Session, turn_count: usize, integrity_error: Option<String>) -> SessionSummary {
    SessionSummary {
        session_id: session.id().masked(),
        user_key: session.user_key().masked(),
        status: session.status(),
        created_at: *session.created_at(),
        updated_at: *session.updated_at(),
        turn_count,
        integrity_error,
    }
}

fn check_suffix(suffix: &str) -> Result<(), InspectError> {
    if suffix.trim().len() < MASK_SUFFIX_LEN {
        return Err(InspectError::SuffixTooShort);
    }
    Ok(())
}
