//! Evidence packaging for completed batches.
//!
//! The archive is a deflate zip holding the screenshot and markup of every
//! found result plus a CSV summary of the whole batch. The zip bytes are
//! content-addressed like any other blob, so re-packaging an identical batch
//! lands at the identical store path.

use crate::error::{CheckError, Result};
use crate::events::{ArchiveEvent, EventBus};
use handlescope_core::CheckStatus;
use handlescope_db::archives::{self, Archive, NewArchive};
use handlescope_db::files;
use handlescope_db::results::{self, CheckResult};
use handlescope_store::{ContentStore, ZipEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use tracing::info;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9A-Za-z]+").expect("valid regex"));

/// Packages a batch's evidence into a zip archive.
pub struct ArchiveBuilder {
    pool: Pool<Sqlite>,
    store: ContentStore,
    events: EventBus,
}

impl ArchiveBuilder {
    /// Assemble a builder over the shared database pool and content store.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>, store: ContentStore, events: EventBus) -> Self {
        Self { pool, store, events }
    }

    /// Package every result of a batch and record the archive.
    ///
    /// Publishes an archive event and returns the recorded archive. Unlike a
    /// failed page render, packaging failures surface: an archive that
    /// silently went missing defeats the point of collecting evidence.
    ///
    /// # Errors
    /// Returns an error if loading results, building the zip, or recording
    /// the archive fails.
    pub async fn create_archive(
        &self,
        username: &str,
        category: Option<String>,
        tracker_id: &str,
    ) -> Result<Archive> {
        let batch = results::get_by_tracker(&self.pool, tracker_id).await?;
        info!(tracker_id, results = batch.len(), "packaging archive");

        let found = count(&batch, CheckStatus::Found);
        let not_found = count(&batch, CheckStatus::NotFound);
        let errors = count(&batch, CheckStatus::Error);

        let stem = archive_stem(username);
        let mut entries = Vec::new();
        let mut summary_rows = Vec::new();

        for result in &batch {
            let screenshot = match &result.image_file_id {
                Some(file_id) => Some(files::get_file(&self.pool, file_id).await?),
                None => None,
            };
            let html_name = result
                .html
                .as_ref()
                .map(|_| format!("{}.html", compact(&result.site_name)));

            if result.status == CheckStatus::Found {
                if let Some(screenshot) = &screenshot {
                    entries.push(ZipEntry::Stored {
                        name: screenshot.name.clone(),
                        relpath: PathBuf::from(screenshot.relpath()),
                    });
                }
                if let (Some(html), Some(html_name)) = (&result.html, &html_name) {
                    entries.push(ZipEntry::Bytes {
                        name: html_name.clone(),
                        content: html.clone().into_bytes(),
                    });
                }
            }

            summary_rows.push([
                result.site_name.clone(),
                result.site_url.clone(),
                result.status.to_string(),
                screenshot.map(|s| s.name).unwrap_or_default(),
                html_name.unwrap_or_default(),
            ]);
        }

        entries.push(ZipEntry::Bytes {
            name: format!("{stem}.csv"),
            content: summary_csv(&summary_rows)?,
        });

        let blob = self.store.put_zip(&entries)?;
        let zip_file = files::create_file(
            &self.pool,
            format!("{stem}.zip"),
            "application/zip".to_string(),
            blob.hash,
        )
        .await?;

        let archive = archives::create_archive(
            &self.pool,
            NewArchive {
                tracker_id: tracker_id.to_string(),
                username: username.to_string(),
                category,
                site_count: i64::try_from(batch.len()).unwrap_or(i64::MAX),
                found_count: found,
                not_found_count: not_found,
                error_count: errors,
                zip_file_id: zip_file.id,
            },
        )
        .await?;
        info!(archive_id = %archive.id, found, not_found, errors, "archive recorded");

        self.events.publish_archive(ArchiveEvent {
            tracker_id: tracker_id.to_string(),
            archive: archive.clone(),
        });

        Ok(archive)
    }
}

fn count(batch: &[CheckResult], status: CheckStatus) -> i64 {
    i64::try_from(batch.iter().filter(|r| r.status == status).count()).unwrap_or(i64::MAX)
}

fn compact(site_name: &str) -> String {
    site_name.replace(' ', "")
}

/// The archive's base filename: the username with every non-alphanumeric run
/// removed, or `archive` when nothing survives.
fn archive_stem(username: &str) -> String {
    let stem = NON_ALPHANUMERIC.replace_all(username, "").into_owned();
    if stem.is_empty() {
        "archive".to_string()
    } else {
        stem
    }
}

fn summary_csv(rows: &[[String; 5]]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Site Name", "Profile URL", "Status", "Screenshot", "HTML"])?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| CheckError::Csv(csv::Error::from(e.into_error())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_stem_strips_non_alphanumerics() {
        assert_eq!(archive_stem("alice"), "alice");
        assert_eq!(archive_stem("alice.o'brien-99"), "aliceobrien99");
        assert_eq!(archive_stem("../../etc/passwd"), "etcpasswd");
        assert_eq!(archive_stem("!!!"), "archive");
    }

    #[test]
    fn test_summary_csv_layout() {
        let rows = vec![[
            "Example Forum".to_string(),
            "https://forum.example.com/users/alice".to_string(),
            "found".to_string(),
            "ExampleForum.jpg".to_string(),
            "ExampleForum.html".to_string(),
        ]];
        let bytes = summary_csv(&rows).expect("build csv");
        let text = String::from_utf8(bytes).expect("utf-8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Site Name,Profile URL,Status,Screenshot,HTML")
        );
        assert_eq!(
            lines.next(),
            Some("Example Forum,https://forum.example.com/users/alice,found,ExampleForum.jpg,ExampleForum.html")
        );
    }
}
