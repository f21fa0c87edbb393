//! Site definition operations.
//!
//! A site describes one external service to probe: a URL template accepting a
//! username, optional custom request headers, and the criteria that decide
//! whether a rendered page means the username exists. Sites are created by
//! configuration and mutated only by the validation pipeline.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use handlescope_core::{HandlescopeError, MatchRule};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;

/// Definition of a target service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Unique identifier
    pub id: String,
    /// Human-readable site name
    pub name: String,
    /// Target URL template; `{username}` is replaced per check
    pub url_template: String,
    /// Custom request headers sent to the renderer for this site
    pub headers: Option<HashMap<String, String>>,
    /// Expected HTTP status of the first navigation-history entry
    pub status_code: Option<u16>,
    /// Raw match rule type as stored (`css`, `text`, `xpath`)
    pub match_type: Option<String>,
    /// Raw match rule expression as stored
    pub match_expr: Option<String>,
    /// Username known to exist on the site (positive control)
    pub test_username_pos: String,
    /// Username known not to exist on the site (negative control)
    pub test_username_neg: String,
    /// Whether the last validation certified this site as usable
    pub valid: bool,
    /// When the site was last validated
    pub tested_at: Option<DateTime<Utc>>,
    /// Result of the last positive validation run
    pub test_result_pos_id: Option<String>,
    /// Result of the last negative validation run
    pub test_result_neg_id: Option<String>,
}

impl Site {
    /// Build the target URL for a username check.
    #[must_use]
    pub fn url_for(&self, username: &str) -> String {
        self.url_template.replace("{username}", username)
    }

    /// The site name with spaces stripped, used for evidence filenames.
    #[must_use]
    pub fn compact_name(&self) -> String {
        self.name.replace(' ', "")
    }

    /// The site's declared match rule, if any.
    ///
    /// This is where untyped `match_type` strings from storage enter the
    /// closed [`MatchRule`] type; an unknown value surfaces here as a
    /// validation error rather than crashing the batch.
    ///
    /// # Errors
    /// Returns a validation error for an unknown `match_type`.
    pub fn match_rule(&self) -> std::result::Result<Option<MatchRule>, HandlescopeError> {
        match (&self.match_type, &self.match_expr) {
            (Some(match_type), Some(match_expr)) => {
                Ok(Some(MatchRule::from_parts(match_type, match_expr)?))
            }
            _ => Ok(None),
        }
    }
}

/// Fields accepted when creating a site.
#[derive(Debug, Clone, Default)]
pub struct NewSite {
    /// Human-readable site name
    pub name: String,
    /// Target URL template; `{username}` is replaced per check
    pub url_template: String,
    /// Custom request headers for this site
    pub headers: Option<HashMap<String, String>>,
    /// Expected HTTP status of the first navigation-history entry
    pub status_code: Option<u16>,
    /// Match rule type (`css`, `text`, `xpath`)
    pub match_type: Option<String>,
    /// Match rule expression
    pub match_expr: Option<String>,
    /// Positive control username
    pub test_username_pos: String,
    /// Negative control username
    pub test_username_neg: String,
}

/// Create a new site definition.
///
/// The site starts unvalidated; only the validation pipeline flips `valid`.
///
/// # Errors
/// Returns an error if the insert fails (e.g. duplicate name).
pub async fn create_site(pool: &Pool<Sqlite>, new: NewSite) -> Result<Site> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();
    let headers_json = match &new.headers {
        Some(headers) => Some(
            serde_json::to_string(headers)
                .map_err(|e| DatabaseError::Decode(format!("headers not serializable: {e}")))?,
        ),
        None => None,
    };

    sqlx::query(
        "INSERT INTO sites (id, name, url_template, headers, status_code, match_type, match_expr,
                            test_username_pos, test_username_neg, valid, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(&new.name)
    .bind(&new.url_template)
    .bind(&headers_json)
    .bind(new.status_code.map(i64::from))
    .bind(&new.match_type)
    .bind(&new.match_expr)
    .bind(&new.test_username_pos)
    .bind(&new.test_username_neg)
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(Site {
        id,
        name: new.name,
        url_template: new.url_template,
        headers: new.headers,
        status_code: new.status_code,
        match_type: new.match_type,
        match_expr: new.match_expr,
        test_username_pos: new.test_username_pos,
        test_username_neg: new.test_username_neg,
        valid: false,
        tested_at: None,
        test_result_pos_id: None,
        test_result_neg_id: None,
    })
}

/// Get a site by id.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` when the site doesn't exist.
pub async fn get_site(pool: &Pool<Sqlite>, site_id: &str) -> Result<Site> {
    let row = sqlx::query(
        "SELECT id, name, url_template, headers, status_code, match_type, match_expr,
                test_username_pos, test_username_neg, valid, tested_at,
                test_result_pos_id, test_result_neg_id
         FROM sites WHERE id = ?",
    )
    .bind(site_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFoundWithMessage(format!("site '{site_id}' not found")))?;

    parse_site_row(&row)
}

/// List all site definitions.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn list_sites(pool: &Pool<Sqlite>) -> Result<Vec<Site>> {
    let rows = sqlx::query(
        "SELECT id, name, url_template, headers, status_code, match_type, match_expr,
                test_username_pos, test_username_neg, valid, tested_at,
                test_result_pos_id, test_result_neg_id
         FROM sites ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_site_row).collect()
}

/// Record the outcome of a site validation run.
///
/// Updates the `valid` flag, the `tested_at` timestamp, and the two result
/// back-references. This is the only mutation the pipeline performs on a site.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` when the site doesn't exist.
pub async fn record_validation(
    pool: &Pool<Sqlite>,
    site_id: &str,
    valid: bool,
    result_pos_id: &str,
    result_neg_id: &str,
) -> Result<()> {
    let tested_at = Utc::now().to_rfc3339();

    let result = sqlx::query(
        "UPDATE sites
         SET valid = ?, tested_at = ?, test_result_pos_id = ?, test_result_neg_id = ?
         WHERE id = ?",
    )
    .bind(valid)
    .bind(&tested_at)
    .bind(result_pos_id)
    .bind(result_neg_id)
    .bind(site_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "site '{site_id}' not found"
        )));
    }

    Ok(())
}

fn parse_site_row(row: &sqlx::sqlite::SqliteRow) -> Result<Site> {
    let headers_json: Option<String> = row.try_get("headers")?;
    let headers = match headers_json {
        Some(json) => Some(
            serde_json::from_str(&json)
                .map_err(|e| DatabaseError::Decode(format!("invalid site headers JSON: {e}")))?,
        ),
        None => None,
    };

    let status_code: Option<i64> = row.try_get("status_code")?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let status_code = status_code.map(|code| code as u16);

    let tested_at: Option<String> = row.try_get("tested_at")?;
    let tested_at = tested_at.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    });

    let valid: i64 = row.try_get("valid")?;

    Ok(Site {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        url_template: row.try_get("url_template")?,
        headers,
        status_code,
        match_type: row.try_get("match_type")?,
        match_expr: row.try_get("match_expr")?,
        test_username_pos: row.try_get("test_username_pos")?,
        test_username_neg: row.try_get("test_username_neg")?,
        valid: valid != 0,
        tested_at,
        test_result_pos_id: row.try_get("test_result_pos_id")?,
        test_result_neg_id: row.try_get("test_result_neg_id")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn sample_site() -> NewSite {
        NewSite {
            name: "Example Forum".to_string(),
            url_template: "https://forum.example.com/users/{username}".to_string(),
            headers: Some(HashMap::from([(
                "accept-language".to_string(),
                "en-US".to_string(),
            )])),
            status_code: Some(200),
            match_type: Some("css".to_string()),
            match_expr: Some(".profile-card".to_string()),
            test_username_pos: "admin".to_string(),
            test_username_neg: "zzz-no-such-user".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_site() {
        let db = setup_test_db().await;

        let created = create_site(db.pool(), sample_site())
            .await
            .expect("create site");
        assert!(!created.valid);

        let loaded = get_site(db.pool(), &created.id).await.expect("get site");
        assert_eq!(loaded.name, "Example Forum");
        assert_eq!(loaded.status_code, Some(200));
        assert_eq!(
            loaded
                .headers
                .as_ref()
                .and_then(|h| h.get("accept-language"))
                .map(String::as_str),
            Some("en-US")
        );
        assert_eq!(
            loaded.url_for("alice"),
            "https://forum.example.com/users/alice"
        );
        assert_eq!(loaded.compact_name(), "ExampleForum");
    }

    #[tokio::test]
    async fn test_match_rule_parsing() {
        let db = setup_test_db().await;
        let site = create_site(db.pool(), sample_site())
            .await
            .expect("create site");

        let rule = site.match_rule().expect("parse rule").expect("rule present");
        assert_eq!(rule, MatchRule::Css(".profile-card".to_string()));
    }

    #[tokio::test]
    async fn test_match_rule_unknown_type_surfaces_error() {
        let db = setup_test_db().await;
        let mut new = sample_site();
        new.match_type = Some("regex".to_string());
        new.match_expr = Some(".*".to_string());

        let site = create_site(db.pool(), new).await.expect("create site");
        assert!(site.match_rule().is_err());
    }

    #[tokio::test]
    async fn test_record_validation() {
        let db = setup_test_db().await;
        let site = create_site(db.pool(), sample_site())
            .await
            .expect("create site");

        // Result back-references are created by the pipeline; any ids work here
        // because the reference columns are nullable and unenforced on update.
        let pos = crate::results::NewResult {
            tracker_id: "t-1".to_string(),
            site_name: site.name.clone(),
            site_url: site.url_for("admin"),
            status: handlescope_core::CheckStatus::Found,
            image_file_id: None,
            username: "admin".to_string(),
            error: None,
            html: None,
        };
        let pos = crate::results::create_result(db.pool(), pos)
            .await
            .expect("create result");
        let neg = crate::results::NewResult {
            tracker_id: "t-2".to_string(),
            site_name: site.name.clone(),
            site_url: site.url_for("zzz-no-such-user"),
            status: handlescope_core::CheckStatus::NotFound,
            image_file_id: None,
            username: "zzz-no-such-user".to_string(),
            error: None,
            html: None,
        };
        let neg = crate::results::create_result(db.pool(), neg)
            .await
            .expect("create result");

        record_validation(db.pool(), &site.id, true, &pos.id, &neg.id)
            .await
            .expect("record validation");

        let loaded = get_site(db.pool(), &site.id).await.expect("get site");
        assert!(loaded.valid);
        assert!(loaded.tested_at.is_some());
        assert_eq!(loaded.test_result_pos_id, Some(pos.id));
        assert_eq!(loaded.test_result_neg_id, Some(neg.id));
    }

    #[tokio::test]
    async fn test_record_validation_missing_site() {
        let db = setup_test_db().await;
        let result = record_validation(db.pool(), "no-such-site", true, "a", "b").await;
        assert!(matches!(
            result,
            Err(DatabaseError::NotFoundWithMessage(_))
        ));
    }
}
