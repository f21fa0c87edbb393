//! Decides whether a rendered page means the username exists.
//!
//! The validator is pure: it looks only at the site's criteria and the raw
//! render material, never at the network or the database. Two independent
//! checks apply, and both must pass: the HTTP status of the first
//! navigation-history entry against the site's expected status, and the
//! site's match rule against the markup. A site that configures neither
//! criterion treats every successful render as a hit.

use handlescope_db::sites::Site;
use handlescope_render::RenderOutcome;
use scraper::{Html, Selector};
use skyscraper::html as sky_html;
use skyscraper::xpath;
use thiserror::Error;

/// A check that could not be evaluated.
///
/// These are recorded as error-status results, not batch failures: one site
/// with a broken selector must not take the rest of the batch down.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The site's stored match rule is not a known type
    #[error("{0}")]
    Rule(String),

    /// The CSS selector does not parse
    #[error("invalid CSS selector '{0}'")]
    InvalidSelector(String),

    /// The XPath expression does not parse
    #[error("invalid XPath expression '{expr}': {reason}")]
    InvalidXpath {
        /// The offending expression
        expr: String,
        /// Parser diagnostic
        reason: String,
    },

    /// The XPath expression failed during evaluation
    #[error("XPath evaluation failed for '{expr}': {reason}")]
    XpathApply {
        /// The offending expression
        expr: String,
        /// Evaluator diagnostic
        reason: String,
    },

    /// The page markup does not parse
    #[error("page markup failed to parse: {0}")]
    Markup(String),

    /// A match rule is configured but the renderer returned no markup
    #[error("renderer returned no markup")]
    MissingMarkup,

    /// A status criterion is configured but the renderer returned no
    /// navigation history
    #[error("renderer returned no navigation history")]
    MissingHistory,
}

/// Evaluate a site's criteria against a successful render.
///
/// Returns `Ok(true)` when every configured criterion passes, `Ok(false)`
/// when at least one fails cleanly, and an error when a criterion could not
/// be evaluated at all.
///
/// # Errors
/// Returns a [`ValidationError`] for unknown rule types, unparseable
/// expressions, or missing render material.
pub fn evaluate(site: &Site, outcome: &RenderOutcome) -> Result<bool, ValidationError> {
    if let Some(expected) = site.status_code {
        let first = outcome
            .history
            .first()
            .ok_or(ValidationError::MissingHistory)?;
        if *first != expected {
            return Ok(false);
        }
    }

    let rule = site
        .match_rule()
        .map_err(|e| ValidationError::Rule(e.to_string()))?;
    if let Some(rule) = rule {
        let html = outcome.html.as_deref().ok_or(ValidationError::MissingMarkup)?;
        if !rule_matches(&rule, html)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn rule_matches(
    rule: &handlescope_core::MatchRule,
    html: &str,
) -> Result<bool, ValidationError> {
    match rule {
        handlescope_core::MatchRule::Css(expr) => {
            let selector = Selector::parse(expr)
                .map_err(|_| ValidationError::InvalidSelector(expr.clone()))?;
            let document = Html::parse_document(html);
            Ok(document.select(&selector).next().is_some())
        }
        handlescope_core::MatchRule::Text(expr) => {
            let document = Html::parse_document(html);
            Ok(visible_text(&document).contains(expr.as_str()))
        }
        handlescope_core::MatchRule::Xpath(expr) => {
            let tree =
                sky_html::parse(html).map_err(|e| ValidationError::Markup(e.to_string()))?;
            let xpath = xpath::parse(expr).map_err(|e| ValidationError::InvalidXpath {
                expr: expr.clone(),
                reason: e.to_string(),
            })?;
            let items = xpath.apply(&tree).map_err(|e| ValidationError::XpathApply {
                expr: expr.clone(),
                reason: e.to_string(),
            })?;
            Ok(!items.is_empty())
        }
    }
}

/// Human-visible page text: every text node outside `<script>` and `<style>`,
/// each trimmed, joined with single spaces.
fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut stack = vec![document.tree.root()];

    while let Some(node) = stack.pop() {
        if let Some(element) = node.value().as_element() {
            let name = element.name();
            if name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style") {
                continue;
            }
        }
        if let Some(text) = node.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
        // children pushed in reverse so traversal keeps document order
        let children: Vec<_> = node.children().collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn site(status_code: Option<u16>, match_type: Option<&str>, match_expr: Option<&str>) -> Site {
        Site {
            id: "site-1".to_string(),
            name: "Example Forum".to_string(),
            url_template: "https://forum.example.com/users/{username}".to_string(),
            headers: Some(HashMap::new()),
            status_code,
            match_type: match_type.map(str::to_string),
            match_expr: match_expr.map(str::to_string),
            test_username_pos: "admin".to_string(),
            test_username_neg: "zzz-no-such-user".to_string(),
            valid: true,
            tested_at: None,
            test_result_pos_id: None,
            test_result_neg_id: None,
        }
    }

    fn outcome(html: &str, history: Vec<u16>) -> RenderOutcome {
        RenderOutcome {
            url: "https://forum.example.com/users/alice".to_string(),
            error: None,
            html: Some(html.to_string()),
            image: Some(vec![0xff, 0xd8]),
            history,
        }
    }

    const PROFILE_PAGE: &str = r#"
        <html><head><style>.card { color: red; }</style></head>
        <body>
          <div class="profile-card"><h1> alice </h1><p>Member since 2019</p></div>
          <script>var user = "ghost";</script>
        </body></html>"#;

    #[test]
    fn test_css_rule_found() {
        let site = site(None, Some("css"), Some(".profile-card"));
        let result = evaluate(&site, &outcome(PROFILE_PAGE, vec![200]));
        assert!(result.expect("evaluate"));
    }

    #[test]
    fn test_css_rule_not_found() {
        let site = site(None, Some("css"), Some(".missing-widget"));
        let result = evaluate(&site, &outcome(PROFILE_PAGE, vec![200]));
        assert!(!result.expect("evaluate"));
    }

    #[test]
    fn test_text_rule_sees_visible_text_only() {
        // "alice" appears in a text node, "ghost" only inside a script.
        let found = site(None, Some("text"), Some("alice"));
        assert!(evaluate(&found, &outcome(PROFILE_PAGE, vec![200])).expect("evaluate"));

        let hidden = site(None, Some("text"), Some("ghost"));
        assert!(!evaluate(&hidden, &outcome(PROFILE_PAGE, vec![200])).expect("evaluate"));

        let styled = site(None, Some("text"), Some("color: red"));
        assert!(!evaluate(&styled, &outcome(PROFILE_PAGE, vec![200])).expect("evaluate"));
    }

    #[test]
    fn test_visible_text_trims_and_joins() {
        let document = Html::parse_document("<p>  alice  </p><p>  bob </p>");
        assert_eq!(visible_text(&document), "alice bob");
    }

    #[test]
    fn test_xpath_rule() {
        let present = site(None, Some("xpath"), Some("//div[@class='profile-card']"));
        assert!(evaluate(&present, &outcome(PROFILE_PAGE, vec![200])).expect("evaluate"));

        let absent = site(None, Some("xpath"), Some("//table"));
        assert!(!evaluate(&absent, &outcome(PROFILE_PAGE, vec![200])).expect("evaluate"));
    }

    #[test]
    fn test_status_check_uses_first_history_entry() {
        let site = site(Some(200), None, None);
        // A redirect chain: first entry decides.
        assert!(evaluate(&site, &outcome(PROFILE_PAGE, vec![200, 301])).expect("evaluate"));
        assert!(!evaluate(&site, &outcome(PROFILE_PAGE, vec![404])).expect("evaluate"));
    }

    #[test]
    fn test_status_and_match_both_required() {
        let site = site(Some(200), Some("css"), Some(".profile-card"));
        assert!(evaluate(&site, &outcome(PROFILE_PAGE, vec![200])).expect("evaluate"));
        assert!(!evaluate(&site, &outcome(PROFILE_PAGE, vec![404])).expect("evaluate"));
    }

    #[test]
    fn test_no_criteria_means_found() {
        let site = site(None, None, None);
        assert!(evaluate(&site, &outcome(PROFILE_PAGE, vec![200])).expect("evaluate"));
    }

    #[test]
    fn test_missing_history_is_an_error() {
        let site = site(Some(200), None, None);
        let result = evaluate(&site, &outcome(PROFILE_PAGE, vec![]));
        assert!(matches!(result, Err(ValidationError::MissingHistory)));
    }

    #[test]
    fn test_missing_markup_is_an_error() {
        let site = site(None, Some("css"), Some(".profile-card"));
        let mut material = outcome("", vec![200]);
        material.html = None;
        let result = evaluate(&site, &material);
        assert!(matches!(result, Err(ValidationError::MissingMarkup)));
    }

    #[test]
    fn test_unknown_rule_type_is_an_error() {
        let site = site(None, Some("regex"), Some(".*"));
        let result = evaluate(&site, &outcome(PROFILE_PAGE, vec![200]));
        assert!(matches!(result, Err(ValidationError::Rule(_))));
    }

    #[test]
    fn test_bad_css_selector_is_an_error() {
        let site = site(None, Some("css"), Some(":::"));
        let result = evaluate(&site, &outcome(PROFILE_PAGE, vec![200]));
        assert!(matches!(result, Err(ValidationError::InvalidSelector(_))));
    }
}
