//! Job lifecycle hooks.
//!
//! The pipeline itself is queue-agnostic: an embedding application (a task
//! queue worker, a CLI, a test harness) supplies the hooks to integrate job
//! accounting and follow-up scheduling. Every hook defaults to a no-op.

use async_trait::async_trait;

/// Lifecycle callbacks around a single username check.
#[async_trait]
pub trait JobHooks: Send + Sync {
    /// Called once before any work for a check begins.
    async fn start_job(&self) {}

    /// Called once after a check finishes, whether it recorded a result or
    /// aborted with an error.
    async fn finish_job(&self) {}

    /// Called at most once per batch, by the check that claimed the
    /// completed batch. The embedder schedules archive packaging however it
    /// runs background work.
    async fn schedule_archive(&self, username: &str, category: Option<&str>, tracker_id: &str) {
        let _ = (username, category, tracker_id);
    }
}

/// Hooks that do nothing. The default for embedders without job accounting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl JobHooks for NoopHooks {}
