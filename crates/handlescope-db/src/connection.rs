//! Database connection management.
//!
//! Provides a pooled `SQLite` connection configured for concurrent workers:
//! WAL journaling for reader/writer overlap and a busy timeout so a briefly
//! locked database does not fail a job.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Open a connection pool for the database at `path`.
///
/// `:memory:` opens an in-memory database, used by tests.
///
/// # Errors
/// Returns `DatabaseError::Open` if the path is invalid or the pool cannot
/// be established.
pub async fn connect(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path_str = path
        .as_ref()
        .to_str()
        .ok_or_else(|| DatabaseError::Open("invalid database path: not valid UTF-8".to_string()))?;

    let options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        // SQLite permits limited write concurrency; a single connection avoids
        // "database is locked" failures when workers overlap.
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

    tracing::info!("Database pool created at {}", path_str);

    Ok(pool)
}
