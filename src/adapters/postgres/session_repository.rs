//! PostgreSQL implementation of SessionRepository.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::PgPool;

use super::{column, decode_err};
use crate::domain::foundation::{SessionId, SessionStatus, Timestamp, UserKey};
use crate::domain::session::Session;
use crate::domain::vault::{RecordTag, SealedBlob};
use crate::ports::{SessionRecord, SessionRepository, StoreError};

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_key, status, wrapped_secret, record_tag, created_at, updated_at
    FROM coach_sessions
"#;

/// PostgreSQL implementation of SessionRepository.
#[derive(Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let session = &record.session;
        sqlx::query(
            r#"
            INSERT INTO coach_sessions (
                id, user_key, status, wrapped_secret, record_tag, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.user_key().as_str())
        .bind(session.status().as_str())
        .bind(session.wrapped_secret().to_bytes())
        .bind(record.tag.as_hex())
        .bind(session.created_at().as_datetime())
        .bind(session.updated_at().as_datetime())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let session = &record.session;
        let result = sqlx::query(
            r#"
            UPDATE coach_sessions SET
                status = $2,
                record_tag = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.status().as_str())
        .bind(record.tag.as_hex())
        .bind(session.updated_at().as_datetime())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::conflict(format!(
                "session {} does not exist",
                session.id().masked()
            )));
        }
        Ok(())
    }

    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_record).transpose()
    }

    async fn find_active_for_user(
        &self,
        user_key: &UserKey,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "{} WHERE user_key = $1 AND status = 'active'",
            SELECT_COLUMNS
        ))
        .bind(user_key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn list_for_user(&self, user_key: &UserKey) -> Result<Vec<SessionRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "{} WHERE user_key = $1 ORDER BY updated_at DESC, created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(user_key.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn list_all(&self, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY updated_at DESC, created_at DESC LIMIT $1",
            SELECT_COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn delete_for_user(&self, user_key: &UserKey) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM coach_sessions WHERE user_key = $1")
            .bind(user_key.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn row_to_record(row: PgRow) -> Result<SessionRecord, StoreError> {
    let id: uuid::Uuid = column(&row, "id")?;
    let user_key: String = column(&row, "user_key")?;
    let status: String = column(&row, "status")?;
    let wrapped: Vec<u8> = column(&row, "wrapped_secret")?;
    let tag: String = column(&row, "record_tag")?;
    let created_at: chrono::DateTime<chrono::Utc> = column(&row, "created_at")?;
    let updated_at: chrono::DateTime<chrono::Utc> = column(&row, "updated_at")?;

    let session = Session::reconstitute(
        SessionId::from_uuid(id),
        UserKey::new(user_key).map_err(|e| decode_err("user_key", e))?,
        status
            .parse::<SessionStatus>()
            .map_err(|e| decode_err("status", e))?,
        SealedBlob::from_bytes(&wrapped).map_err(|e| decode_err("wrapped_secret", e))?,
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    );

    Ok(SessionRecord {
        session,
        tag: RecordTag::from_hex(tag),
    })
}
