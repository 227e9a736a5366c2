//! PostgreSQL adapters for the storage ports.
//!
//! - `PostgresSessionRepository` - session records
//! - `PostgresMemoryStore` - sealed profiles, turns and plans
//!
//! [`connect`] opens a pool and applies the bundled migrations.

mod memory_store;
mod session_repository;

pub use memory_store::PostgresMemoryStore;
pub use session_repository::PostgresSessionRepository;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::fmt::Display;
use std::time::Duration;

use crate::ports::StoreError;

/// Opens a connection pool and runs pending migrations.
pub async fn connect(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::unavailable(format!("migration failed: {}", e)))?;

    tracing::info!(max_connections, "postgres store ready");
    Ok(pool)
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Serialization(format!("column {}: {}", name, e)))
}

fn decode_err(field: &str, err: impl Display) -> StoreError {
    StoreError::Serialization(format!("invalid {}: {}", field, err))
}
