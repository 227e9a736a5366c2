//! PostgreSQL implementation of MemoryStore.
//!
//! Embeddings are stored as `REAL[]` and ranked in process, so no vector
//! extension is required.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::PgPool;

use super::{column, decode_err};
use crate::domain::foundation::{PlanVersion, SessionId, Timestamp, UserKey};
use crate::domain::vault::SealedBlob;
use crate::ports::{
    Embedding, MemoryStore, ProfileMatch, StoreError, StoredPlan, StoredProfile, StoredTurn,
};

#[derive(Clone)]
pub struct PostgresMemoryStore {
    pool: PgPool,
}

impl PostgresMemoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoryStore for PostgresMemoryStore {
    async fn upsert_profile(&self, profile: StoredProfile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO coach_profiles (user_key, sealed, embedding, session_id, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_key) DO UPDATE SET
                sealed = EXCLUDED.sealed,
                embedding = EXCLUDED.embedding,
                session_id = EXCLUDED.session_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.user_key.as_str())
        .bind(profile.sealed.to_bytes())
        .bind(profile.embedding.as_slice())
        .bind(profile.session_id.map(|id| *id.as_uuid()))
        .bind(profile.updated_at.as_datetime())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_profile(&self, user_key: &UserKey) -> Result<Option<StoredProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT user_key, sealed, embedding, session_id, updated_at FROM coach_profiles WHERE user_key = $1",
        )
        .bind(user_key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_profile).transpose()
    }

    async fn append_turn(
        &self,
        session_id: &SessionId,
        sealed: SealedBlob,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The upsert takes a row lock on the counter, serializing appenders
        // for the same session until commit.
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO coach_turn_counters (session_id, last_sequence)
            VALUES ($1, 1)
            ON CONFLICT (session_id) DO UPDATE
                SET last_sequence = coach_turn_counters.last_sequence + 1
            RETURNING last_sequence
            "#,
        )
        .bind(session_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO coach_turns (session_id, sequence, sealed, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(sequence)
        .bind(sealed.to_bytes())
        .bind(Timestamp::now().as_datetime())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        u64::try_from(sequence).map_err(|e| decode_err("sequence", e))
    }

    async fn list_turns(
        &self,
        session_id: &SessionId,
        after: Option<u64>,
    ) -> Result<Vec<StoredTurn>, StoreError> {
        let after = i64::try_from(after.unwrap_or(0)).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT session_id, sequence, sealed, created_at
            FROM coach_turns
            WHERE session_id = $1 AND sequence > $2
            ORDER BY sequence ASC
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_turn).collect()
    }

    async fn nearest_profiles(
        &self,
        embedding: &Embedding,
        k: usize,
        exclude: Option<&UserKey>,
    ) -> Result<Vec<ProfileMatch>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT user_key, sealed, embedding, session_id, updated_at
            FROM coach_profiles
            WHERE ($1::TEXT IS NULL OR user_key <> $1)
              AND cardinality(embedding) = $2
            "#,
        )
        .bind(exclude.map(UserKey::as_str))
        .bind(i32::try_from(embedding.dimensions()).unwrap_or(i32::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut matches = rows
            .into_iter()
            .map(row_to_profile)
            .map(|profile| {
                profile.map(|record| ProfileMatch {
                    similarity: embedding.similarity(&record.embedding),
                    record,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.record.user_key.cmp(&b.record.user_key))
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn save_plan(&self, plan: StoredPlan) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM coach_plans WHERE user_key = $1")
                .bind(plan.user_key.as_str())
                .fetch_one(&mut *tx)
                .await?;

        let expected = latest.unwrap_or(0) + 1;
        let version = i64::try_from(plan.version.value()).unwrap_or(i64::MAX);
        if version != expected {
            return Err(StoreError::conflict(format!(
                "plan version {} for {}, expected v{}",
                plan.version,
                plan.user_key.masked(),
                expected
            )));
        }

        // A racing writer that passed the same check loses on the primary key.
        sqlx::query(
            r#"
            INSERT INTO coach_plans (user_key, version, session_id, sealed, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(plan.user_key.as_str())
        .bind(version)
        .bind(plan.session_id.as_uuid())
        .bind(plan.sealed.to_bytes())
        .bind(plan.created_at.as_datetime())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn latest_plan(&self, user_key: &UserKey) -> Result<Option<StoredPlan>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_key, version, session_id, sealed, created_at
            FROM coach_plans
            WHERE user_key = $1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(user_key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_plan).transpose()
    }

    async fn purge_user(
        &self,
        user_key: &UserKey,
        sessions: &[SessionId],
    ) -> Result<(), StoreError> {
        let session_uuids: Vec<uuid::Uuid> = sessions.iter().map(|s| *s.as_uuid()).collect();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM coach_turns WHERE session_id = ANY($1)")
            .bind(&session_uuids)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM coach_turn_counters WHERE session_id = ANY($1)")
            .bind(&session_uuids)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM coach_plans WHERE user_key = $1")
            .bind(user_key.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM coach_profiles WHERE user_key = $1")
            .bind(user_key.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn row_to_profile(row: PgRow) -> Result<StoredProfile, StoreError> {
    let user_key: String = column(&row, "user_key")?;
    let sealed: Vec<u8> = column(&row, "sealed")?;
    let embedding: Vec<f32> = column(&row, "embedding")?;
    let session_id: Option<uuid::Uuid> = column(&row, "session_id")?;
    let updated_at: chrono::DateTime<chrono::Utc> = column(&row, "updated_at")?;

    Ok(StoredProfile {
        user_key: UserKey::new(user_key).map_err(|e| decode_err("user_key", e))?,
        sealed: SealedBlob::from_bytes(&sealed).map_err(|e| decode_err("sealed", e))?,
        embedding: Embedding::new(embedding),
        session_id: session_id.map(SessionId::from_uuid),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

fn row_to_turn(row: PgRow) -> Result<StoredTurn, StoreError> {
    let session_id: uuid::Uuid = column(&row, "session_id")?;
    let sequence: i64 = column(&row, "sequence")?;
    let sealed: Vec<u8> = column(&row, "sealed")?;
    let created_at: chrono::DateTime<chrono::Utc> = column(&row, "created_at")?;

    Ok(StoredTurn {
        session_id: SessionId::from_uuid(session_id),
        sequence: u64::try_from(sequence).map_err(|e| decode_err("sequence", e))?,
        sealed: SealedBlob::from_bytes(&sealed).map_err(|e| decode_err("sealed", e))?,
        created_at: Timestamp::from_datetime(created_at),
    })
}

fn row_to_plan(row: PgRow) -> Result<StoredPlan, StoreError> {
    let user_key: String = column(&row, "user_key")?;
    let version: i64 = column(&row, "version")?;
    let session_id: uuid::Uuid = column(&row, "session_id")?;
    let sealed: Vec<u8> = column(&row, "sealed")?;
    let created_at: chrono::DateTime<chrono::Utc> = column(&row, "created_at")?;

    let version = u64::try_from(version).map_err(|e| decode_err("version", e))?;
    Ok(StoredPlan {
        user_key: UserKey::new(user_key).map_err(|e| decode_err("user_key", e))?,
        version: PlanVersion::new(version).map_err(|e| decode_err("version", e))?,
        session_id: SessionId::from_uuid(session_id),
        sealed: SealedBlob::from_bytes(&sealed).map_err(|e| decode_err("sealed", e))?,
        created_at: Timestamp::from_datetime(created_at),
    })
}
