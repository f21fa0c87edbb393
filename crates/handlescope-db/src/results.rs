//! Result operations.
//!
//! A result is the immutable fact record of checking one username against one
//! site within a batch. Results are inserted exactly once per (site, batch)
//! and never updated.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use handlescope_core::CheckStatus;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// One outcome of checking a single username against a single site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Unique identifier
    pub id: String,
    /// Batch this check belongs to
    pub tracker_id: String,
    /// Site name snapshot at check time
    pub site_name: String,
    /// Target URL snapshot at check time
    pub site_url: String,
    /// Check outcome
    pub status: CheckStatus,
    /// Evidence image reference
    pub image_file_id: Option<String>,
    /// Username that was checked
    pub username: String,
    /// Error message when the check failed
    pub error: Option<String>,
    /// Raw page markup, stored only when the username was found
    pub html: Option<String>,
    /// When the result was recorded
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when recording a result.
#[derive(Debug, Clone)]
pub struct NewResult {
    /// Batch this check belongs to
    pub tracker_id: String,
    /// Site name snapshot
    pub site_name: String,
    /// Target URL snapshot
    pub site_url: String,
    /// Check outcome
    pub status: CheckStatus,
    /// Evidence image reference
    pub image_file_id: Option<String>,
    /// Username that was checked
    pub username: String,
    /// Error message when the check failed
    pub error: Option<String>,
    /// Raw page markup (callers pass this only for found results)
    pub html: Option<String>,
}

/// Record a check result.
///
/// # Errors
/// Returns an error if the insert fails, including the unique
/// (`tracker_id`, `site_url`) constraint for duplicate checks.
pub async fn create_result(pool: &Pool<Sqlite>, new: NewResult) -> Result<CheckResult> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO results (id, tracker_id, site_name, site_url, status, image_file_id,
                              username, error, html, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&new.tracker_id)
    .bind(&new.site_name)
    .bind(&new.site_url)
    .bind(new.status.to_string())
    .bind(&new.image_file_id)
    .bind(&new.username)
    .bind(&new.error)
    .bind(&new.html)
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(CheckResult {
        id,
        tracker_id: new.tracker_id,
        site_name: new.site_name,
        site_url: new.site_url,
        status: new.status,
        image_file_id: new.image_file_id,
        username: new.username,
        error: new.error,
        html: new.html,
        created_at,
    })
}

/// Get a result by id.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` when the result doesn't exist.
pub async fn get_result(pool: &Pool<Sqlite>, result_id: &str) -> Result<CheckResult> {
    let row = sqlx::query(
        "SELECT id, tracker_id, site_name, site_url, status, image_file_id,
                username, error, html, created_at
         FROM results WHERE id = ?",
    )
    .bind(result_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFoundWithMessage(format!("result '{result_id}' not found")))?;

    parse_result_row(&row)
}

/// Get every result recorded for a batch, oldest first.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_by_tracker(pool: &Pool<Sqlite>, tracker_id: &str) -> Result<Vec<CheckResult>> {
    let rows = sqlx::query(
        "SELECT id, tracker_id, site_name, site_url, status, image_file_id,
                username, error, html, created_at
         FROM results WHERE tracker_id = ? ORDER BY created_at",
    )
    .bind(tracker_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_result_row).collect()
}

fn parse_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<CheckResult> {
    let status_str: String = row.try_get("status")?;
    let status = CheckStatus::parse(&status_str)
        .map_err(|e| DatabaseError::Decode(format!("invalid result status: {e}")))?;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    Ok(CheckResult {
        id: row.try_get("id")?,
        tracker_id: row.try_get("tracker_id")?,
        site_name: row.try_get("site_name")?,
        site_url: row.try_get("site_url")?,
        status,
        image_file_id: row.try_get("image_file_id")?,
        username: row.try_get("username")?,
        error: row.try_get("error")?,
        html: row.try_get("html")?,
        created_at,
    })
}
