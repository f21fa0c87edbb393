//! Handlescope Core - shared types, configuration, and errors.
//!
//! This crate provides the foundation used by every other handlescope crate:
//! validated domain newtypes, the TOML-based application configuration, and the
//! central error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, RendererConfig, StorageConfig};
pub use error::{ConfigError, ConfigResult, HandlescopeError, Result};
pub use types::{CheckStatus, MatchRule, TrackerId};
