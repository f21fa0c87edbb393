//! Shared types used across the handlescope pipeline.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::HandlescopeError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for batch tracker identifiers with validation.
///
/// A tracker id is the opaque identifier grouping every per-site check issued
/// for one username-search request. It must be 1-255 characters of printable
/// ASCII with no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackerId(String);

impl TrackerId {
    /// Create a new `TrackerId` from a string.
    ///
    /// # Errors
    /// Returns error if the id is empty, too long, or contains whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, HandlescopeError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `TrackerId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the sub-tracker id used for the nth self-validation run.
    ///
    /// Site validation runs the check pipeline twice, each run against its own
    /// sub-tracker (`<tracker>-1`, `<tracker>-2`) so the runs never share a
    /// progress counter with a real batch.
    #[must_use]
    pub fn sub_tracker(&self, n: u8) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    fn validate(id: &str) -> Result<(), HandlescopeError> {
        static TRACKER_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            TRACKER_REGEX.get_or_init(|| Regex::new(r"^[\x21-\x7e]{1,255}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(HandlescopeError::Validation(format!(
                "invalid tracker id: must be 1-255 printable characters without whitespace, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of checking one username against one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The username exists on the site
    Found,
    /// The username does not exist on the site
    NotFound,
    /// The check could not be completed
    Error,
}

impl CheckStatus {
    /// Parse from the string representation stored in the database.
    ///
    /// # Errors
    /// Returns error for any string other than `found`, `not_found`, `error`.
    pub fn parse(s: &str) -> Result<Self, HandlescopeError> {
        match s {
            "found" => Ok(Self::Found),
            "not_found" => Ok(Self::NotFound),
            "error" => Ok(Self::Error),
            other => Err(HandlescopeError::Validation(format!(
                "invalid check status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found => write!(f, "found"),
            Self::NotFound => write!(f, "not_found"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A site-specific predicate applied to rendered markup to decide whether a
/// username exists.
///
/// The rule set is closed: evaluation dispatches exhaustively over these three
/// variants. Untyped `match_type` strings loaded from storage enter the type
/// through [`MatchRule::from_parts`], which is the only place an unknown rule
/// can surface, as a runtime validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match_type", content = "match_expr", rename_all = "lowercase")]
pub enum MatchRule {
    /// At least one element matches the CSS selector
    Css(String),
    /// The declared expression is a substring of the page's visible text
    Text(String),
    /// At least one node matches the XPath expression
    Xpath(String),
}

impl MatchRule {
    /// Build a rule from the `(match_type, match_expr)` pair stored on a site.
    ///
    /// # Errors
    /// Returns error when `match_type` names an unknown rule.
    pub fn from_parts(match_type: &str, match_expr: &str) -> Result<Self, HandlescopeError> {
        match match_type {
            "css" => Ok(Self::Css(match_expr.to_string())),
            "text" => Ok(Self::Text(match_expr.to_string())),
            "xpath" => Ok(Self::Xpath(match_expr.to_string())),
            other => Err(HandlescopeError::Validation(format!(
                "unknown match_type '{other}'"
            ))),
        }
    }

    /// The `match_type` string stored in the database for this rule.
    #[must_use]
    pub fn type_str(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::Text(_) => "text",
            Self::Xpath(_) => "xpath",
        }
    }

    /// The rule's expression.
    #[must_use]
    pub fn expr(&self) -> &str {
        match self {
            Self::Css(e) | Self::Text(e) | Self::Xpath(e) => e,
        }
    }
}
