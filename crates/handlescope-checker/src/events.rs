//! In-process event fan-out.
//!
//! Three broadcast topics mirror the pipeline's observable milestones: a
//! result recorded, a site validated, an archive packaged. Publishing is
//! fire-and-forget: a topic with no live subscriber drops the event, and no
//! pipeline path ever fails because nobody was listening.

use handlescope_db::archives::Archive;
use handlescope_db::results::CheckResult;
use handlescope_db::sites::Site;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Default per-topic channel capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// A result was recorded for a batch.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEvent {
    /// The recorded result
    pub result: CheckResult,
    /// Checks completed so far in the batch
    pub current: i64,
    /// Expected batch size
    pub total: i64,
}

/// A site finished its validation run.
#[derive(Debug, Clone, Serialize)]
pub struct SiteEvent {
    /// Batch that ran the validation
    pub tracker_id: String,
    /// The site with its refreshed validation state
    pub site: Site,
}

/// A batch's evidence was packaged.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveEvent {
    /// Batch the archive belongs to
    pub tracker_id: String,
    /// The recorded archive
    pub archive: Archive,
}

/// Broadcast hub for pipeline events.
#[derive(Debug, Clone)]
pub struct EventBus {
    result_tx: broadcast::Sender<ResultEvent>,
    site_tx: broadcast::Sender<SiteEvent>,
    archive_tx: broadcast::Sender<ArchiveEvent>,
}

impl EventBus {
    /// Create a bus whose topics each buffer up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (result_tx, _) = broadcast::channel(capacity);
        let (site_tx, _) = broadcast::channel(capacity);
        let (archive_tx, _) = broadcast::channel(capacity);
        Self {
            result_tx,
            site_tx,
            archive_tx,
        }
    }

    /// Subscribe to recorded results.
    #[must_use]
    pub fn subscribe_results(&self) -> broadcast::Receiver<ResultEvent> {
        self.result_tx.subscribe()
    }

    /// Subscribe to site validation outcomes.
    #[must_use]
    pub fn subscribe_sites(&self) -> broadcast::Receiver<SiteEvent> {
        self.site_tx.subscribe()
    }

    /// Subscribe to packaged archives.
    #[must_use]
    pub fn subscribe_archives(&self) -> broadcast::Receiver<ArchiveEvent> {
        self.archive_tx.subscribe()
    }

    /// Publish a recorded result. Dropped when nobody subscribes.
    pub fn publish_result(&self, event: ResultEvent) {
        if self.result_tx.send(event).is_err() {
            debug!("no subscribers for result event");
        }
    }

    /// Publish a site validation outcome. Dropped when nobody subscribes.
    pub fn publish_site(&self, event: SiteEvent) {
        if self.site_tx.send(event).is_err() {
            debug!("no subscribers for site event");
        }
    }

    /// Publish a packaged archive. Dropped when nobody subscribes.
    pub fn publish_archive(&self, event: ArchiveEvent) {
        if self.archive_tx.send(event).is_err() {
            debug!("no subscribers for archive event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
