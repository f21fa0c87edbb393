//! Render client error types.

use thiserror::Error;

/// Errors raised before or around a rendering request.
///
/// Failures of the rendering request itself (HTTP errors, malformed
/// payloads) are not errors at this level; they are absorbed into the
/// returned outcome so the batch can always complete.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Configuration errors, fatal before any request is made.
    #[error("configuration error: {0}")]
    Config(#[from] handlescope_core::ConfigError),

    /// Proxy selection failed (database fault, not "no proxy available").
    #[error("proxy selection failed: {0}")]
    ProxySelection(#[from] handlescope_db::DatabaseError),

    /// The rendering service base URL cannot be resolved to an endpoint.
    #[error("invalid renderer URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type alias for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
