//! Client for the external rendering service.
//!
//! The renderer is a Splash-compatible headless browser exposing a
//! `render.json` endpoint: one POST returns the rendered markup, a JPEG
//! screenshot, and the navigation history for a target URL. This client only
//! fetches and surfaces that raw material; deciding found/not-found from it
//! belongs to the caller.

use crate::error::Result;
use crate::proxy::ProxyPool;
use crate::{RenderOutcome, Renderer};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use handlescope_core::{ConfigError, RendererConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Default user agent attached when the caller supplies none.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:40.0) Gecko/20100101 Firefox/40.1";

/// Server-side per-resource fetch timeout in seconds.
///
/// Kept shorter than the overall request timeout so a single stalled
/// sub-resource cannot eat the whole render budget.
const RESOURCE_TIMEOUT_SECS: u64 = 5;

/// Client for the external rendering service.
pub struct RenderClient {
    client: Client,
    endpoint: Url,
    username: String,
    password: String,
    timeout_secs: u64,
    proxy_pool: ProxyPool,
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    url: &'a str,
    html: u8,
    jpeg: u8,
    har: u8,
    history: u8,
    timeout: u64,
    resource_timeout: u64,
    headers: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy: Option<String>,
}

#[derive(Deserialize)]
struct RenderResponse {
    html: Option<String>,
    jpeg: Option<String>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
struct HistoryEntry {
    response: HistoryStatus,
}

#[derive(Deserialize)]
struct HistoryStatus {
    status: u16,
}

impl RenderClient {
    /// Create a client from renderer configuration.
    ///
    /// # Errors
    /// Returns `RenderError::Config` when the base URL or credentials are
    /// missing or the timeout is not a positive integer; no request is ever
    /// issued with a broken configuration.
    pub fn new(config: &RendererConfig, proxy_pool: ProxyPool) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "renderer.base_url".to_string(),
            }
            .into());
        }

        if config.username.is_empty() || config.password.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "renderer.username/password".to_string(),
            }
            .into());
        }

        if config.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "renderer.timeout_secs".to_string(),
                reason: "request timeout must be a positive integer".to_string(),
            }
            .into());
        }

        let endpoint = Url::parse(&config.base_url)?.join("render.json")?;

        // The HTTP timeout wraps the renderer's own budget with a little
        // headroom for transfer of the screenshot payload.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs + 10))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "renderer".to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout_secs: config.timeout_secs,
            proxy_pool,
        })
    }

    /// Build the request headers for a render, injecting the default user
    /// agent when the caller did not supply one (case-insensitive check).
    ///
    /// A fresh map is constructed per call; header maps are never shared
    /// across invocations.
    fn effective_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
        let mut effective = headers.clone();

        let has_user_agent = effective
            .keys()
            .any(|key| key.eq_ignore_ascii_case("user-agent"));
        if !has_user_agent {
            effective.insert("user-agent".to_string(), USER_AGENT.to_string());
        }

        effective
    }
}

#[async_trait]
impl Renderer for RenderClient {
    async fn render(
        &self,
        target_url: &str,
        headers: &HashMap<String, String>,
        timeout_override: Option<u64>,
    ) -> Result<RenderOutcome> {
        let headers = Self::effective_headers(headers);
        let timeout = timeout_override.unwrap_or(self.timeout_secs);

        // A database fault here is fatal for the job; an empty proxy pool
        // is not.
        let proxy = self.proxy_pool.pick().await?;

        let payload = RenderRequest {
            url: target_url,
            html: 1,
            jpeg: 1,
            har: 1,
            history: 1,
            timeout,
            resource_timeout: RESOURCE_TIMEOUT_SECS,
            headers: &headers,
            proxy,
        };

        tracing::debug!(url = %target_url, timeout, "requesting render");

        let response = match self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %target_url, error = %e, "render request failed");
                return Ok(RenderOutcome::failed(target_url, e.to_string()));
            }
        };

        if let Err(e) = response.error_for_status_ref() {
            tracing::warn!(url = %target_url, error = %e, "renderer returned error status");
            return Ok(RenderOutcome::failed(target_url, e.to_string()));
        }

        let body: RenderResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %target_url, error = %e, "malformed render payload");
                return Ok(RenderOutcome::failed(target_url, e.to_string()));
            }
        };

        let image = match body.jpeg.as_deref().map(|jpeg| BASE64.decode(jpeg)) {
            Some(Ok(bytes)) => Some(bytes),
            Some(Err(e)) => {
                tracing::warn!(url = %target_url, error = %e, "undecodable screenshot");
                return Ok(RenderOutcome::failed(target_url, e.to_string()));
            }
            None => None,
        };

        Ok(RenderOutcome {
            url: target_url.to_string(),
            error: None,
            html: body.html,
            image,
            history: body.history.iter().map(|h| h.response.status).collect(),
        })
    }
}
