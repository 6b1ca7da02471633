//! Constants for the fetch module (timeouts, retry defaults, robots.txt limits).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-attempt request timeout (30 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default attempt budget for the main request path (0 = single attempt, no retry).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 0;

/// Default backoff multiplier in seconds.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.0;

/// Default backoff cap in seconds.
pub const DEFAULT_BACKOFF_CAP_SECS: f64 = 1.0;

/// Default attempt budget for robots.txt fetches.
pub const DEFAULT_ROBOTS_MAX_ATTEMPTS: u32 = 3;

/// Timeout applied to each robots.txt fetch attempt.
pub const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// robots.txt bodies beyond this size are truncated at the last complete line.
pub const MAX_ROBOTS_BODY_BYTES: usize = 500 * 1024;

/// Upper bound accepted for any configured attempt budget.
pub const MAX_CONFIGURED_ATTEMPTS: u32 = 20;

/// Redirect hops followed for one logical request when redirects are enabled.
pub const MAX_REDIRECTS: usize = 10;

/// Redirect hops followed when fetching robots.txt itself.
pub const ROBOTS_MAX_REDIRECTS: usize = 5;
