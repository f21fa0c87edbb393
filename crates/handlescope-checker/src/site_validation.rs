//! Site self-validation.
//!
//! A site definition is only trustworthy if its criteria actually separate
//! existing from non-existing accounts. Validation runs the real check
//! pipeline twice in test mode: once with a username known to exist on the
//! site and once with one known not to. The site is certified valid only when
//! the positive run lands `found` and the negative run lands `not_found`; any
//! other combination, including errors, leaves it invalid.

use crate::error::Result;
use crate::events::SiteEvent;
use crate::pipeline::{CheckPipeline, CheckRequest};
use handlescope_core::{CheckStatus, TrackerId};
use handlescope_db::sites::{self, Site};
use tracing::info;

/// Runs validation checks against site definitions.
pub struct SiteValidationPipeline {
    pipeline: CheckPipeline,
}

impl SiteValidationPipeline {
    /// Wrap a check pipeline.
    #[must_use]
    pub fn new(pipeline: CheckPipeline) -> Self {
        Self { pipeline }
    }

    /// Validate a site with its positive and negative control usernames.
    ///
    /// Both runs use test mode, each against its own sub-tracker, so they
    /// never touch a real batch's progress counter. The refreshed site is
    /// returned and a site event is published.
    ///
    /// # Errors
    /// Returns an error for infrastructure faults; a control check that
    /// merely lands the wrong status is a `valid = false` outcome, not an
    /// error.
    pub async fn test_site(&self, site_id: &str, tracker_id: &TrackerId) -> Result<Site> {
        let site = sites::get_site(self.pipeline.pool(), site_id).await?;
        info!(site = %site.name, tracker_id = %tracker_id, "validating site");

        let positive = self
            .pipeline
            .check_username(CheckRequest {
                username: site.test_username_pos.clone(),
                site_id: site_id.to_string(),
                category: None,
                tracker_id: tracker_id.sub_tracker(1),
                total: 1,
                test: true,
            })
            .await?;

        let negative = self
            .pipeline
            .check_username(CheckRequest {
                username: site.test_username_neg.clone(),
                site_id: site_id.to_string(),
                category: None,
                tracker_id: tracker_id.sub_tracker(2),
                total: 1,
                test: true,
            })
            .await?;

        let valid = positive.status == CheckStatus::Found
            && negative.status == CheckStatus::NotFound;
        sites::record_validation(
            self.pipeline.pool(),
            site_id,
            valid,
            &positive.id,
            &negative.id,
        )
        .await?;

        let site = sites::get_site(self.pipeline.pool(), site_id).await?;
        info!(site = %site.name, valid, "site validation finished");
        self.pipeline.events().publish_site(SiteEvent {
            tracker_id: tracker_id.to_string(),
            site: site.clone(),
        });

        Ok(site)
    }
}
