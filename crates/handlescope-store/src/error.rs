//! Content store error types.

use thiserror::Error;

/// Errors from blob persistence and archive assembly.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the operation targeted
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Zip archive assembly failed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A referenced stored blob does not exist on disk.
    #[error("stored blob missing: {0}")]
    MissingBlob(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
