//! robots.txt bodies and path evaluation.
//!
//! Parsing and matching are delegated to `texting_robots`: user-agent groups
//! selected by product token, `Allow` / `Disallow` with `*` and `$`, and
//! longest-match precedence with `Allow` winning ties. This module adds the
//! body checks (size cap, UTF-8, HTML error pages) and the unconditional
//! allow-all / disallow-all outcomes.

use std::fmt;
use std::time::Duration;

use texting_robots::Robot;

use crate::fetch::constants::MAX_ROBOTS_BODY_BYTES;

/// Token used by the catch-all group.
pub const WILDCARD_AGENT: &str = "*";

/// Parsed crawling policy for one origin and user agent.
pub struct RobotsRuleSet {
    policy: Policy,
}

enum Policy {
    AllowAll,
    DisallowAll,
    Parsed(Box<Robot>),
}

impl fmt::Debug for RobotsRuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let policy = match &self.policy {
            Policy::AllowAll => "allow_all",
            Policy::DisallowAll => "disallow_all",
            Policy::Parsed(_) => "parsed",
        };
        f.debug_struct("RobotsRuleSet")
            .field("policy", &policy)
            .field("crawl_delay", &self.crawl_delay())
            .field("sitemaps", &self.sitemaps().len())
            .finish()
    }
}

/// Why a robots.txt body was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RobotsParseError {
    /// The body is not valid UTF-8.
    #[error("robots.txt body is not valid UTF-8")]
    NotUtf8,
    /// The server returned an HTML document instead of a robots.txt file.
    #[error("robots.txt body is an HTML document")]
    HtmlDocument,
    /// The parser rejected the body.
    #[error("robots.txt body could not be parsed: {0}")]
    Invalid(String),
}

impl RobotsRuleSet {
    /// A rule set permitting every path.
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            policy: Policy::AllowAll,
        }
    }

    /// A rule set denying every path.
    #[must_use]
    pub fn disallow_all() -> Self {
        Self {
            policy: Policy::DisallowAll,
        }
    }

    /// Returns whether this rule set permits everything unconditionally.
    #[must_use]
    pub fn is_allow_all(&self) -> bool {
        matches!(self.policy, Policy::AllowAll)
    }

    /// Returns whether this rule set denies everything unconditionally.
    #[must_use]
    pub fn is_disallow_all(&self) -> bool {
        matches!(self.policy, Policy::DisallowAll)
    }

    /// Parses a raw robots.txt body for `user_agent`.
    ///
    /// Only the product token of `user_agent` selects the group
    /// (`Googlebot/2.1 (+http://google.com)` is evaluated as `googlebot`).
    /// Bodies larger than 500 KiB are truncated at the last complete line.
    ///
    /// # Errors
    ///
    /// Returns [`RobotsParseError`] when the body is not UTF-8, is an HTML
    /// page, or cannot be parsed.
    pub fn from_bytes(user_agent: &str, body: &[u8]) -> Result<Self, RobotsParseError> {
        let body = truncate_body(body);
        let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
        let text = std::str::from_utf8(body).map_err(|_| RobotsParseError::NotUtf8)?;
        if looks_like_html(text) {
            return Err(RobotsParseError::HtmlDocument);
        }
        let robot = Robot::new(&product_token(user_agent), text.as_bytes())
            .map_err(|error| RobotsParseError::Invalid(error.to_string()))?;
        Ok(Self {
            policy: Policy::Parsed(Box::new(robot)),
        })
    }

    /// Evaluates `path` (path plus optional query).
    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        match &self.policy {
            Policy::AllowAll => true,
            Policy::DisallowAll => false,
            Policy::Parsed(_) if path == "/robots.txt" => true,
            Policy::Parsed(robot) => robot.allowed(if path.is_empty() { "/" } else { path }),
        }
    }

    /// The `Crawl-delay` of the selected group, if any.
    #[must_use]
    pub fn crawl_delay(&self) -> Option<Duration> {
        match &self.policy {
            Policy::Parsed(robot) => robot
                .delay
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f32),
            _ => None,
        }
    }

    /// `Sitemap` URLs listed in the body.
    #[must_use]
    pub fn sitemaps(&self) -> &[String] {
        match &self.policy {
            Policy::Parsed(robot) => &robot.sitemaps,
            _ => &[],
        }
    }
}

/// Lowercased product token of a user-agent string (`Googlebot/2.1` -> `googlebot`).
fn product_token(user_agent: &str) -> String {
    let trimmed = user_agent.trim();
    if trimmed.is_empty() || trimmed == WILDCARD_AGENT {
        return WILDCARD_AGENT.to_string();
    }
    trimmed
        .split(['/', ' '])
        .next()
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Caps the body at the last complete line, or the last full character
/// when the capped region has no line break.
fn truncate_body(body: &[u8]) -> &[u8] {
    if body.len() <= MAX_ROBOTS_BODY_BYTES {
        return body;
    }
    let head = &body[..MAX_ROBOTS_BODY_BYTES];
    if let Some(end) = head.iter().rposition(|b| *b == b'\n') {
        return &head[..end];
    }
    match std::str::from_utf8(head) {
        // A character split by the cap; real encoding errors are left for the UTF-8 check.
        Err(error) if error.error_len().is_none() => &head[..error.valid_up_to()],
        _ => head,
    }
}

fn looks_like_html(text: &str) -> bool {
    let start: String = text
        .trim_start()
        .chars()
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    start.starts_with("<!doctype html") || start.starts_with("<html")
}
