//! File record operations.
//!
//! A file row is the database-side identity of a content-addressed blob: the
//! bytes themselves live in the content store, keyed by the same hash stored
//! here. The relative filesystem path is derived from the hash, never stored.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Database record for a content-addressed blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique identifier
    pub id: String,
    /// Original file name (e.g. `ExampleForum.jpg`)
    pub name: String,
    /// MIME type
    pub mime: String,
    /// Hex-encoded SHA-256 of the content
    pub hash: String,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Relative path of the blob inside the data directory, derived from the
    /// hash: first hex character, second hex character, remainder.
    #[must_use]
    pub fn relpath(&self) -> String {
        format!("{}/{}/{}", &self.hash[..1], &self.hash[1..2], &self.hash[2..])
    }
}

/// Create a file record for content already persisted in the store.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn create_file(
    pool: &Pool<Sqlite>,
    name: String,
    mime: String,
    hash: String,
) -> Result<FileRecord> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();

    sqlx::query("INSERT INTO files (id, name, mime, hash, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(&name)
        .bind(&mime)
        .bind(&hash)
        .bind(created_at.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(FileRecord {
        id,
        name,
        mime,
        hash,
        created_at,
    })
}

/// Get a file record by id.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` when the record doesn't exist.
pub async fn get_file(pool: &Pool<Sqlite>, file_id: &str) -> Result<FileRecord> {
    let row = sqlx::query("SELECT id, name, mime, hash, created_at FROM files WHERE id = ?")
        .bind(file_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            DatabaseError::NotFoundWithMessage(format!("file '{file_id}' not found"))
        })?;

    parse_file_row(&row)
}

/// Get the newest file record with the given name.
///
/// Used to look up pre-provisioned evidence such as the generic error image.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` when no record has the name.
pub async fn get_by_name(pool: &Pool<Sqlite>, name: &str) -> Result<FileRecord> {
    let row = sqlx::query(
        "SELECT id, name, mime, hash, created_at FROM files
         WHERE name = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFoundWithMessage(format!("file named '{name}' not found")))?;

    parse_file_row(&row)
}

fn parse_file_row(row: &sqlx::sqlite::SqliteRow) -> Result<FileRecord> {
    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    Ok(FileRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        mime: row.try_get("mime")?,
        hash: row.try_get("hash")?,
        created_at,
    })
}
