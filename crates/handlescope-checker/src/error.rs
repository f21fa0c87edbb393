//! Error types for the check pipeline.

use thiserror::Error;

/// Errors that abort a pipeline operation.
///
/// Per-site render failures are not in this taxonomy on purpose: they become
/// error-status results and the batch keeps moving. What surfaces here is the
/// infrastructure the batch cannot run without.
#[derive(Error, Debug)]
pub enum CheckError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] handlescope_core::ConfigError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] handlescope_db::DatabaseError),

    /// Content store error
    #[error("Storage error: {0}")]
    Storage(#[from] handlescope_store::StoreError),

    /// Renderer infrastructure error (config or proxy selection, never a
    /// failed page render)
    #[error("Render error: {0}")]
    Render(#[from] handlescope_render::RenderError),

    /// The generic error image is not seeded in the store
    #[error("Missing error image: {0}")]
    MissingErrorImage(String),

    /// Cross-cutting domain error
    #[error(transparent)]
    Core(#[from] handlescope_core::HandlescopeError),

    /// CSV serialization error while building an archive summary
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, CheckError>;
