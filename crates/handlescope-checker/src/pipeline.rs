//! The username check pipeline.
//!
//! One invocation checks one username against one site: render the profile
//! URL, persist the screenshot as evidence, decide found / not-found / error,
//! record the result, and advance the batch counter. Render failures become
//! error-status results with a generic evidence image; only infrastructure
//! faults (database, storage, renderer configuration) abort the check.

use crate::error::{CheckError, Result};
use crate::events::{EventBus, ResultEvent};
use crate::hooks::JobHooks;
use crate::progress::ProgressTracker;
use crate::validator;
use handlescope_core::{CheckStatus, TrackerId};
use handlescope_db::error::DatabaseError;
use handlescope_db::files::{self, FileRecord};
use handlescope_db::results::{self, CheckResult, NewResult};
use handlescope_db::sites::{self, Site};
use handlescope_render::{RenderOutcome, Renderer};
use handlescope_store::ContentStore;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the generic evidence image used when a render produced no
/// screenshot. Must be seeded before the first check runs.
pub const ERROR_IMAGE_NAME: &str = "error.png";

/// Everything needed to run one check.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Username to look for
    pub username: String,
    /// Site definition to check against
    pub site_id: String,
    /// Originating category, carried through to the archive
    pub category: Option<String>,
    /// Batch this check belongs to
    pub tracker_id: TrackerId,
    /// Expected number of checks in the batch
    pub total: i64,
    /// Test mode: record the result but skip batch accounting, events, and
    /// archive claiming. Used by site validation runs.
    pub test: bool,
}

/// Checks usernames against site definitions.
pub struct CheckPipeline {
    pool: Pool<Sqlite>,
    store: ContentStore,
    renderer: Arc<dyn Renderer>,
    progress: ProgressTracker,
    events: EventBus,
    hooks: Arc<dyn JobHooks>,
}

impl CheckPipeline {
    /// Assemble a pipeline over the shared database pool and content store.
    #[must_use]
    pub fn new(
        pool: Pool<Sqlite>,
        store: ContentStore,
        renderer: Arc<dyn Renderer>,
        events: EventBus,
        hooks: Arc<dyn JobHooks>,
    ) -> Self {
        let progress = ProgressTracker::new(pool.clone());
        Self {
            pool,
            store,
            renderer,
            progress,
            events,
            hooks,
        }
    }

    /// The event bus this pipeline publishes to.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The database pool this pipeline records into.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Check one username against one site and record the outcome.
    ///
    /// Returns the recorded result. Outside test mode the batch counter is
    /// advanced, a result event is published, and the check that completes
    /// the batch schedules archive packaging through the job hooks.
    ///
    /// # Errors
    /// Returns an error for infrastructure faults only; a failed page render
    /// is recorded as an error-status result and is not an `Err`.
    pub async fn check_username(&self, request: CheckRequest) -> Result<CheckResult> {
        self.hooks.start_job().await;
        let outcome = self.run_check(&request).await;
        self.hooks.finish_job().await;
        outcome
    }

    async fn run_check(&self, request: &CheckRequest) -> Result<CheckResult> {
        let site = sites::get_site(&self.pool, &request.site_id).await?;
        let target_url = site.url_for(&request.username);
        info!(
            site = %site.name,
            username = %request.username,
            tracker_id = %request.tracker_id,
            "checking username"
        );

        let headers = site.headers.clone().unwrap_or_default();
        let material = self.renderer.render(&target_url, &headers, None).await?;

        let evidence = self.save_evidence(&site, &material).await?;

        let (status, error, html) = if let Some(render_error) = &material.error {
            warn!(site = %site.name, error = %render_error, "render failed");
            (CheckStatus::Error, Some(render_error.clone()), None)
        } else {
            match validator::evaluate(&site, &material) {
                Ok(true) => (CheckStatus::Found, None, material.html.clone()),
                Ok(false) => (CheckStatus::NotFound, None, None),
                Err(validation_error) => {
                    warn!(site = %site.name, error = %validation_error, "validation failed");
                    (CheckStatus::Error, Some(validation_error.to_string()), None)
                }
            }
        };

        let result = results::create_result(
            &self.pool,
            NewResult {
                tracker_id: request.tracker_id.as_str().to_string(),
                site_name: site.name.clone(),
                site_url: target_url,
                status,
                image_file_id: Some(evidence.id),
                username: request.username.clone(),
                error,
                html,
            },
        )
        .await?;
        debug!(result_id = %result.id, status = %result.status, "result recorded");

        if !request.test {
            let current = self
                .progress
                .increment(request.tracker_id.as_str(), request.total)
                .await?;
            self.events.publish_result(ResultEvent {
                result: result.clone(),
                current,
                total: request.total,
            });

            if self.progress.claim_archive(request.tracker_id.as_str()).await? {
                self.hooks
                    .schedule_archive(
                        &request.username,
                        request.category.as_deref(),
                        request.tracker_id.as_str(),
                    )
                    .await;
            }
        }

        Ok(result)
    }

    /// Persist the screenshot for a successful render, or fall back to the
    /// seeded generic error image when there is nothing to show.
    async fn save_evidence(&self, site: &Site, material: &RenderOutcome) -> Result<FileRecord> {
        if material.is_ok() {
            if let Some(image) = &material.image {
                let blob = self.store.put(image)?;
                return Ok(files::create_file(
                    &self.pool,
                    format!("{}.jpg", site.compact_name()),
                    "image/jpeg".to_string(),
                    blob.hash,
                )
                .await?);
            }
        }

        match files::get_by_name(&self.pool, ERROR_IMAGE_NAME).await {
            Ok(record) => Ok(record),
            Err(DatabaseError::NotFound | DatabaseError::NotFoundWithMessage(_)) => {
                Err(CheckError::MissingErrorImage(format!(
                    "seed '{ERROR_IMAGE_NAME}' before running checks"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Seed the generic error image the pipeline falls back to.
///
/// Idempotent in effect: re-seeding records a new file row and later lookups
/// take the newest one.
///
/// # Errors
/// Returns an error if the store write or the database insert fails.
pub async fn seed_error_image(
    pool: &Pool<Sqlite>,
    store: &ContentStore,
    content: &[u8],
) -> Result<FileRecord> {
    let blob = store.put(content)?;
    Ok(files::create_file(
        pool,
        ERROR_IMAGE_NAME.to_string(),
        "image/png".to_string(),
        blob.hash,
    )
    .await?)
}
