//! Handlescope Render - access to the external rendering service.
//!
//! This crate issues page-render requests to a Splash-compatible headless
//! browser service, optionally through a randomly selected egress proxy, and
//! surfaces the raw material (markup, screenshot, navigation history) plus a
//! success/error discriminator. Deciding whether a username exists from that
//! material is the checker's job, not this crate's.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod client;
pub mod error;
pub mod proxy;

// Re-export commonly used types
pub use client::{RenderClient, USER_AGENT};
pub use error::{RenderError, Result};
pub use proxy::ProxyPool;

use async_trait::async_trait;
use std::collections::HashMap;

/// Raw material returned for one rendered page.
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    /// The URL that was rendered
    pub url: String,
    /// Error text when the render failed; `None` means success
    pub error: Option<String>,
    /// Rendered page markup
    pub html: Option<String>,
    /// Decoded screenshot bytes (JPEG)
    pub image: Option<Vec<u8>>,
    /// HTTP status of each navigation-history entry, in order
    pub history: Vec<u16>,
}

impl RenderOutcome {
    /// An outcome tagged as failed, carrying no markup or image.
    #[must_use]
    pub fn failed(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Whether the render completed successfully.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Seam over the rendering service.
///
/// The check pipeline depends on this trait so it can be exercised without a
/// live renderer.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `target_url` and return the raw material.
    ///
    /// Per-request failures (HTTP errors, malformed payloads) are absorbed
    /// into the outcome's `error` tag; only configuration or database faults
    /// surface as `Err`.
    async fn render(
        &self,
        target_url: &str,
        headers: &HashMap<String, String>,
        timeout_override: Option<u64>,
    ) -> Result<RenderOutcome>;
}
