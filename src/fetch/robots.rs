//! Cached robots.txt authorization.
//!
//! [`RobotsAuthorizer`] fetches `origin/robots.txt` lazily, once per
//! `(origin, user-agent)` key, and keeps the parsed [`RobotsRuleSet`] for its
//! own lifetime. Concurrent first lookups for the same key share one fetch.
//!
//! Status interpretation:
//!
//! | Response | Result |
//! |----------|--------|
//! | 200 | parse body (malformed body: allow all) |
//! | 401, 403 | disallow all |
//! | anything else | allow all |
//! | fetch failed after retries | allow all |

mod rules;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};
use url::Url;

pub use rules::{RobotsParseError, RobotsRuleSet, WILDCARD_AGENT};

use super::constants::ROBOTS_FETCH_TIMEOUT;
use super::{BackoffPolicy, TransportError};

/// Cache key: one rule set per origin and user agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RobotsKey {
    /// `scheme://host[:port]`.
    pub origin: String,
    /// The user agent the rule set was resolved for.
    pub user_agent: String,
}

type RuleCell = Arc<OnceCell<Arc<RobotsRuleSet>>>;

/// robots.txt checker with a shared, never-expiring per-origin cache.
///
/// Designed to be shared by reference across concurrent calls. Fetches for
/// different keys run independently; fetches for the same key collapse into
/// one network request whose result every waiter receives.
#[derive(Debug)]
pub struct RobotsAuthorizer {
    client: Client,
    policy: BackoffPolicy,
    fetch_timeout: Duration,
    cache: DashMap<RobotsKey, RuleCell>,
    fetches: AtomicU64,
}

impl RobotsAuthorizer {
    /// Creates an authorizer that fetches through `client` with its own retry budget.
    #[must_use]
    pub fn new(client: Client, policy: BackoffPolicy) -> Self {
        Self {
            client,
            policy,
            fetch_timeout: ROBOTS_FETCH_TIMEOUT,
            cache: DashMap::new(),
            fetches: AtomicU64::new(0),
        }
    }

    /// Overrides the per-attempt robots.txt fetch timeout.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Returns the retry policy used for robots.txt fetches.
    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Number of robots.txt fetches started (one per cache miss).
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of cached `(origin, user-agent)` entries.
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Drops the cached entry for a key so the next lookup refetches.
    pub fn evict(&self, origin: &str, user_agent: &str) -> bool {
        let key = RobotsKey {
            origin: origin.to_string(),
            user_agent: user_agent.to_string(),
        };
        self.cache.remove(&key).is_some()
    }

    /// Returns whether `url` may be fetched by `user_agent` (`None` means `*`).
    ///
    /// URLs without a host cannot carry a robots policy and are allowed.
    #[instrument(skip(self), fields(origin))]
    pub async fn is_allowed(&self, url: &str, user_agent: Option<&str>) -> bool {
        let user_agent = user_agent
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .unwrap_or(WILDCARD_AGENT);
        let Ok(parsed) = Url::parse(url) else {
            debug!(url, "unparseable URL, skipping robots check");
            return true;
        };
        let Some(origin) = origin_of(&parsed) else {
            debug!(url, "URL has no origin, skipping robots check");
            return true;
        };
        tracing::Span::current().record("origin", origin.as_str());

        let rules = self.rules_for(&origin, user_agent).await;
        let allowed = rules.is_allowed(&path_and_query(&parsed));
        if !allowed {
            debug!(url, user_agent, "robots.txt disallows URL");
        }
        allowed
    }

    /// Returns the cached rule set for a key, fetching it on first use.
    pub async fn rules_for(&self, origin: &str, user_agent: &str) -> Arc<RobotsRuleSet> {
        let key = RobotsKey {
            origin: origin.to_string(),
            user_agent: user_agent.to_string(),
        };
        // Clone the cell out so no DashMap shard lock is held across the await.
        let cell = self
            .cache
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_init(|| self.fetch_rules(origin, user_agent))
            .await
            .clone()
    }

    #[instrument(skip(self))]
    async fn fetch_rules(&self, origin: &str, user_agent: &str) -> Arc<RobotsRuleSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

        let outcome = self
            .policy
            .execute(|| self.fetch_once(&robots_url))
            .await;

        let rules = match outcome {
            Ok((status, body)) => interpret_response(&robots_url, user_agent, status, &body),
            Err(error) => {
                warn!(
                    url = %robots_url,
                    error = %error,
                    "robots.txt fetch failed after retries; allowing all"
                );
                RobotsRuleSet::allow_all()
            }
        };
        Arc::new(rules)
    }

    async fn fetch_once(&self, robots_url: &str) -> Result<(StatusCode, Vec<u8>), TransportError> {
        let response = self
            .client
            .get(robots_url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(robots_url, e))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Ok((status, Vec::new()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(robots_url, e))?;
        Ok((status, body.to_vec()))
    }
}

fn interpret_response(
    robots_url: &str,
    user_agent: &str,
    status: StatusCode,
    body: &[u8],
) -> RobotsRuleSet {
    match status {
        StatusCode::OK => match RobotsRuleSet::from_bytes(user_agent, body) {
            Ok(rules) => {
                debug!(
                    url = %robots_url,
                    user_agent,
                    crawl_delay = ?rules.crawl_delay(),
                    sitemaps = rules.sitemaps().len(),
                    "parsed robots.txt"
                );
                rules
            }
            Err(error) => {
                warn!(url = %robots_url, error = %error, "malformed robots.txt; allowing all");
                RobotsRuleSet::allow_all()
            }
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            debug!(url = %robots_url, status = status.as_u16(), "robots.txt refused; disallowing all");
            RobotsRuleSet::disallow_all()
        }
        other => {
            debug!(url = %robots_url, status = other.as_u16(), "no robots.txt policy; allowing all");
            RobotsRuleSet::allow_all()
        }
    }
}

/// Builds the origin string (scheme + host + non-default port) of a parsed URL.
fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

/// Builds the origin string (scheme + host) from a URL for robots.txt lookup.
#[must_use]
pub fn origin_for_robots(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(origin_of)
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}
