//! Construction-time configuration for [`ScraperClient`](crate::fetch::ScraperClient).
//!
//! Values come from code (`ClientConfig::default()` plus `with_*` setters), a
//! JSON file, or `SCRAPER_*` environment variables layered over the defaults.
//! Every loader validates before returning.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::fetch::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BACKOFF_CAP_SECS, DEFAULT_BACKOFF_MULTIPLIER,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_ROBOTS_MAX_ATTEMPTS, MAX_CONFIGURED_ATTEMPTS,
    REQUEST_TIMEOUT_SECS,
};
use crate::fetch::{BackoffPolicy, CookiePolicy};

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field is outside its accepted range.
    #[error("Invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// The rejected value, rendered.
        value: String,
        /// Accepted range or form.
        expected: &'static str,
    },

    /// The config file could not be read.
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`ClientConfig`].
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// An environment variable holds an unparseable value.
    #[error("Invalid value for environment variable {name}: '{value}'")]
    Env {
        /// Variable name.
        name: &'static str,
        /// The raw value.
        value: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Configuration consumed by [`ScraperClient`](crate::fetch::ScraperClient) at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Metrics label for the job issuing requests; `None` disables metrics.
    pub scraper_id: Option<String>,
    /// Total attempts per request; 0 or 1 disables retrying.
    pub max_attempts: u32,
    /// Backoff window scale in seconds.
    pub backoff_multiplier: f64,
    /// Upper bound for a single backoff delay in seconds.
    pub backoff_cap_secs: f64,
    /// Keep cookies across requests on the same client.
    pub persist_cookies: bool,
    /// Check robots.txt before each request.
    pub respect_robots: bool,
    /// Follow 3xx responses, checking robots.txt before each hop.
    /// When off, redirects are returned to the caller as responses.
    pub follow_redirects: bool,
    /// Attempt budget for robots.txt fetches.
    pub robots_max_attempts: u32,
    /// User-Agent header; defaults to the crate's own.
    pub user_agent: Option<String>,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-attempt request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Headers added to every request.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scraper_id: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            backoff_cap_secs: DEFAULT_BACKOFF_CAP_SECS,
            persist_cookies: false,
            respect_robots: true,
            follow_redirects: false,
            robots_max_attempts: DEFAULT_ROBOTS_MAX_ATTEMPTS,
            user_agent: None,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            default_headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Sets the scraper id used as the metrics label.
    #[must_use]
    pub fn with_scraper_id(mut self, scraper_id: impl Into<String>) -> Self {
        self.scraper_id = Some(scraper_id.into());
        self
    }

    /// Sets the retry budget and backoff shape.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, multiplier: f64, cap_secs: f64) -> Self {
        self.max_attempts = max_attempts;
        self.backoff_multiplier = multiplier;
        self.backoff_cap_secs = cap_secs;
        self
    }

    /// Sets whether cookies persist across requests.
    #[must_use]
    pub fn with_persist_cookies(mut self, persist: bool) -> Self {
        self.persist_cookies = persist;
        self
    }

    /// Sets whether robots.txt is enforced.
    #[must_use]
    pub fn with_respect_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    /// Sets whether redirects are followed inside the pipeline.
    #[must_use]
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Sets the robots.txt fetch attempt budget.
    #[must_use]
    pub fn with_robots_max_attempts(mut self, attempts: u32) -> Self {
        self.robots_max_attempts = attempts;
        self
    }

    /// Sets the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the per-attempt request timeout in seconds.
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_attempts("max_attempts", self.max_attempts)?;
        validate_attempts("robots_max_attempts", self.robots_max_attempts)?;
        validate_secs("backoff_multiplier", self.backoff_multiplier)?;
        validate_secs("backoff_cap_secs", self.backoff_cap_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        if let Some(scraper_id) = &self.scraper_id
            && scraper_id.trim() != scraper_id
        {
            return Err(ConfigError::invalid(
                "scraper_id",
                scraper_id,
                "no leading or trailing whitespace",
            ));
        }
        Ok(())
    }

    /// Loads and validates a JSON config file; absent keys take their defaults.
    ///
    /// # Errors
    ///
    /// Read, parse or validation failures.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Layers `SCRAPER_*` environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// Unparseable variable values or validation failures.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a caller-supplied variable source.
    ///
    /// # Errors
    ///
    /// Unparseable variable values or validation failures.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = var("SCRAPER_ID") {
            config.scraper_id = Some(value.trim().to_string());
        }
        if let Some(value) = var("SCRAPER_MAX_ATTEMPTS") {
            config.max_attempts = parse_env("SCRAPER_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = var("SCRAPER_BACKOFF_MULTIPLIER") {
            config.backoff_multiplier = parse_env("SCRAPER_BACKOFF_MULTIPLIER", &value)?;
        }
        if let Some(value) = var("SCRAPER_BACKOFF_CAP_SECS") {
            config.backoff_cap_secs = parse_env("SCRAPER_BACKOFF_CAP_SECS", &value)?;
        }
        if let Some(value) = var("SCRAPER_PERSIST_COOKIES") {
            config.persist_cookies = parse_env_bool("SCRAPER_PERSIST_COOKIES", &value)?;
        }
        if let Some(value) = var("SCRAPER_RESPECT_ROBOTS") {
            config.respect_robots = parse_env_bool("SCRAPER_RESPECT_ROBOTS", &value)?;
        }
        if let Some(value) = var("SCRAPER_FOLLOW_REDIRECTS") {
            config.follow_redirects = parse_env_bool("SCRAPER_FOLLOW_REDIRECTS", &value)?;
        }
        if let Some(value) = var("SCRAPER_ROBOTS_MAX_ATTEMPTS") {
            config.robots_max_attempts = parse_env("SCRAPER_ROBOTS_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = var("SCRAPER_USER_AGENT") {
            config.user_agent = Some(value.trim().to_string());
        }

        config.validate()?;
        Ok(config)
    }

    /// Backoff policy for page requests.
    #[must_use]
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.max_attempts,
            self.backoff_multiplier,
            self.backoff_cap_secs,
        )
    }

    /// Backoff policy for robots.txt fetches: own budget, same backoff shape.
    #[must_use]
    pub fn robots_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.robots_max_attempts,
            self.backoff_multiplier,
            self.backoff_cap_secs,
        )
    }

    /// Cookie policy derived from `persist_cookies`.
    #[must_use]
    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy::from_persist_flag(self.persist_cookies)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-attempt request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn validate_attempts(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value > MAX_CONFIGURED_ATTEMPTS {
        return Err(ConfigError::invalid(field, value, "range 0..=20"));
    }
    Ok(())
}

fn validate_secs(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            field,
            value,
            "a finite, non-negative number of seconds",
        ));
    }
    Ok(())
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(field, value, "range 1..=3600"));
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name,
        value: value.to_string(),
    })
}

fn parse_env_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Env {
            name,
            value: value.to_string(),
        }),
    }
}
