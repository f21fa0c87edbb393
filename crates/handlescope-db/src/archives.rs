//! Archive record operations.
//!
//! An archive row summarizes one completed batch: aggregate status counts and
//! a reference to the zip file holding the packaged evidence.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A completed batch's packaged evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    /// Unique identifier
    pub id: String,
    /// Batch the archive belongs to
    pub tracker_id: String,
    /// Username the batch searched for
    pub username: String,
    /// Originating category, if the search was category-scoped
    pub category: Option<String>,
    /// Number of sites checked
    pub site_count: i64,
    /// Number of found results
    pub found_count: i64,
    /// Number of not-found results
    pub not_found_count: i64,
    /// Number of errored results
    pub error_count: i64,
    /// The zip file holding the evidence
    pub zip_file_id: String,
    /// When the archive was created
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when recording an archive.
#[derive(Debug, Clone)]
pub struct NewArchive {
    /// Batch the archive belongs to
    pub tracker_id: String,
    /// Username the batch searched for
    pub username: String,
    /// Originating category
    pub category: Option<String>,
    /// Number of sites checked
    pub site_count: i64,
    /// Number of found results
    pub found_count: i64,
    /// Number of not-found results
    pub not_found_count: i64,
    /// Number of errored results
    pub error_count: i64,
    /// The zip file holding the evidence
    pub zip_file_id: String,
}

/// Record an archive.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn create_archive(pool: &Pool<Sqlite>, new: NewArchive) -> Result<Archive> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO archives (id, tracker_id, username, category, site_count, found_count,
                               not_found_count, error_count, zip_file_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&new.tracker_id)
    .bind(&new.username)
    .bind(&new.category)
    .bind(new.site_count)
    .bind(new.found_count)
    .bind(new.not_found_count)
    .bind(new.error_count)
    .bind(&new.zip_file_id)
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(Archive {
        id,
        tracker_id: new.tracker_id,
        username: new.username,
        category: new.category,
        site_count: new.site_count,
        found_count: new.found_count,
        not_found_count: new.not_found_count,
        error_count: new.error_count,
        zip_file_id: new.zip_file_id,
        created_at,
    })
}

/// Get every archive recorded for a batch.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_by_tracker(pool: &Pool<Sqlite>, tracker_id: &str) -> Result<Vec<Archive>> {
    let rows = sqlx::query(
        "SELECT id, tracker_id, username, category, site_count, found_count,
                not_found_count, error_count, zip_file_id, created_at
         FROM archives WHERE tracker_id = ? ORDER BY created_at",
    )
    .bind(tracker_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_archive_row).collect()
}

fn parse_archive_row(row: &sqlx::sqlite::SqliteRow) -> Result<Archive> {
    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| DatabaseError::Decode(format!("invalid archive timestamp: {e}")))?
        .with_timezone(&Utc);

    Ok(Archive {
        id: row.try_get("id")?,
        tracker_id: row.try_get("tracker_id")?,
        username: row.try_get("username")?,
        category: row.try_get("category")?,
        site_count: row.try_get("site_count")?,
        found_count: row.try_get("found_count")?,
        not_found_count: row.try_get("not_found_count")?,
        error_count: row.try_get("error_count")?,
        zip_file_id: row.try_get("zip_file_id")?,
        created_at,
    })
}
