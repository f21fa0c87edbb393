//! Configuration management for handlescope.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/handlescope/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used, but the
/// renderer section must then be filled in through environment variables
/// before any check can run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Rendering service settings
    pub renderer: RendererConfig,
    /// Evidence storage settings
    pub storage: StorageConfig,
    /// Progress event settings
    pub events: EventsConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `HANDLESCOPE_RENDERER_URL`: Override the rendering service base URL
    /// - `HANDLESCOPE_RENDERER_USER` / `HANDLESCOPE_RENDERER_PASSWORD`:
    ///   Override the rendering service credentials
    /// - `HANDLESCOPE_RENDER_TIMEOUT_SECS`: Override the request timeout
    /// - `HANDLESCOPE_DATA_DIR`: Override the evidence data directory
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("HANDLESCOPE_RENDERER_URL") {
            config.renderer.base_url = val;
        }

        if let Ok(val) = std::env::var("HANDLESCOPE_RENDERER_USER") {
            config.renderer.username = val;
        }

        if let Ok(val) = std::env::var("HANDLESCOPE_RENDERER_PASSWORD") {
            config.renderer.password = val;
        }

        if let Ok(val) = std::env::var("HANDLESCOPE_RENDER_TIMEOUT_SECS") {
            let secs = val.parse().map_err(|_| ConfigError::InvalidValue {
                field: "renderer.timeout_secs".to_string(),
                reason: format!("request timeout must be an integer: {val}"),
            })?;
            config.renderer.timeout_secs = secs;
            tracing::debug!("Override renderer.timeout_secs from env: {}", secs);
        }

        if let Ok(val) = std::env::var("HANDLESCOPE_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Check that every value a check job depends on is present and sane.
    ///
    /// This runs before any I/O: a job never reaches the network or the
    /// filesystem with a broken configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.renderer.base_url.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "renderer.base_url".to_string(),
            });
        }

        if self.renderer.username.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "renderer.username".to_string(),
            });
        }

        if self.renderer.password.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "renderer.password".to_string(),
            });
        }

        if self.renderer.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "renderer.timeout_secs".to_string(),
                reason: "request timeout must be a positive integer".to_string(),
            });
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/handlescope/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "handlescope", "handlescope")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the default data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/handlescope`
    pub fn default_data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "handlescope", "handlescope")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Rendering service settings.
///
/// The renderer is an external headless-browser service with a
/// Splash-compatible `render.json` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Base URL of the rendering service
    pub base_url: String,
    /// Basic-auth username for the rendering service
    pub username: String,
    /// Basic-auth password for the rendering service
    pub password: String,
    /// Overall request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Evidence storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the content-addressable data store
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Progress event settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity per topic
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.renderer.base_url = "http://localhost:8050".to_string();
        config.renderer.username = "render".to_string();
        config.renderer.password = "secret".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.renderer.timeout_secs, 10);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert_eq!(config.events.capacity, 256);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        valid_config().validate().expect("complete config is valid");
    }

    #[test]
    fn test_validate_rejects_missing_renderer_values() {
        let mut config = valid_config();
        config.renderer.base_url.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingValue { field }) if field == "renderer.base_url"
        ));

        let mut config = valid_config();
        config.renderer.password.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = valid_config();
        config.renderer.timeout_secs = 0;
        let err = config.validate().expect_err("zero timeout is invalid");
        assert!(err.to_string().contains("positive integer"));
    }

    #[test]
    fn test_non_numeric_timeout_is_config_error() {
        let toml = r#"
            [renderer]
            base_url = "http://localhost:8050"
            timeout_secs = "ten"
        "#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = valid_config();
        let serialized = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&serialized).expect("parse");
        assert_eq!(parsed.renderer.base_url, config.renderer.base_url);
        assert_eq!(parsed.renderer.timeout_secs, config.renderer.timeout_secs);
    }
}
