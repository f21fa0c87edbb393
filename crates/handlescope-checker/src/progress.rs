//! Batch progress accounting.
//!
//! Thin façade over the tracker rows: an atomic per-batch counter plus a
//! single-winner claim that decides which check triggers archive packaging.
//! Many checks for one batch run concurrently, so both operations are
//! arbitrated by the database, never by in-process state.

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use tracing::debug;

/// Progress counter for concurrent batches.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    pool: Pool<Sqlite>,
}

impl ProgressTracker {
    /// Wrap a database pool.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Count one completed check and return the batch's running total.
    ///
    /// # Errors
    /// Returns an error if the database update fails.
    pub async fn increment(&self, tracker_id: &str, total: i64) -> Result<i64> {
        let current = handlescope_db::trackers::increment(&self.pool, tracker_id, total).await?;
        debug!(tracker_id, current, total, "batch progress");
        Ok(current)
    }

    /// Try to claim archive packaging for a completed batch.
    ///
    /// Returns `true` for exactly one caller over the batch's lifetime, and
    /// only once the counter has reached the expected total. Late checks
    /// past the total find the claim already taken.
    ///
    /// # Errors
    /// Returns an error if the database update fails.
    pub async fn claim_archive(&self, tracker_id: &str) -> Result<bool> {
        let claimed = handlescope_db::trackers::claim_archive(&self.pool, tracker_id).await?;
        if claimed {
            debug!(tracker_id, "batch complete, archive claimed");
        }
        Ok(claimed)
    }

    /// Current and expected counts for a batch, if the batch has started.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_progress(&self, tracker_id: &str) -> Result<Option<(i64, i64)>> {
        Ok(handlescope_db::trackers::get_progress(&self.pool, tracker_id).await?)
    }
}
