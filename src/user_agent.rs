//! Shared User-Agent strings and crawl header presets.
//!
//! Single source for the crate's identifying UA so page and robots.txt traffic
//! stay consistent.

use std::collections::BTreeMap;

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/scraper-client";

/// Browser-like User-Agent used by [`default_crawl_headers`].
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

/// Default User-Agent for page requests (identifies the tool).
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("scraper-client/{version} (+{PROJECT_UA_URL})")
}

/// Browser-like headers for sites that reject obvious bots.
///
/// Feed into [`ClientConfig::default_headers`](crate::config::ClientConfig::default_headers).
/// An explicit [`ClientConfig::user_agent`](crate::config::ClientConfig::user_agent)
/// takes precedence over the `User-Agent` entry here.
#[must_use]
pub fn default_crawl_headers() -> BTreeMap<String, String> {
    [
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,\
             image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
        ),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Cache-Control", "no-cache"),
        ("Pragma", "no-cache"),
        ("User-Agent", BROWSER_USER_AGENT),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}
