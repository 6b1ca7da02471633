//! Cookie isolation between requests issued from one client.
//!
//! With [`CookiePolicy::Isolated`] (the default) the HTTP client carries no
//! cookie store at all: every attempt starts from an empty jar and any
//! `Set-Cookie` a response sends is discarded once that call finishes. There is
//! no shared jar to reset, so concurrent calls can never observe a half-reset
//! state.
//!
//! With [`CookiePolicy::Persistent`] one [`Jar`] is shared by every request
//! on the client, so session cookies accumulate across calls.

use std::sync::Arc;

use reqwest::ClientBuilder;
use reqwest::cookie::{CookieStore, Jar};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Whether cookies survive from one request to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookiePolicy {
    /// Each request starts with no cookies.
    #[default]
    Isolated,
    /// Cookies accumulate across requests on the same client.
    Persistent,
}

impl CookiePolicy {
    /// Maps the `persist_cookies` configuration flag onto a policy.
    #[must_use]
    pub fn from_persist_flag(persist_cookies: bool) -> Self {
        if persist_cookies {
            Self::Persistent
        } else {
            Self::Isolated
        }
    }

    /// Returns whether cookies persist across requests.
    #[must_use]
    pub fn persists(self) -> bool {
        self == Self::Persistent
    }
}

/// The cookie state owned by one client.
#[derive(Debug, Clone)]
pub struct CookieSession {
    policy: CookiePolicy,
    jar: Option<Arc<Jar>>,
}

impl CookieSession {
    /// Creates the session state for `policy`; persistent sessions start with an empty jar.
    #[must_use]
    pub fn new(policy: CookiePolicy) -> Self {
        let jar = policy.persists().then(|| Arc::new(Jar::default()));
        Self { policy, jar }
    }

    /// Creates a persistent session seeded with an existing jar.
    #[must_use]
    pub fn with_jar(jar: Arc<Jar>) -> Self {
        Self {
            policy: CookiePolicy::Persistent,
            jar: Some(jar),
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> CookiePolicy {
        self.policy
    }

    /// Returns the shared jar, present only for persistent sessions.
    #[must_use]
    pub fn jar(&self) -> Option<&Arc<Jar>> {
        self.jar.as_ref()
    }

    /// Returns the `Cookie` header the session would send to `url`, if any.
    #[must_use]
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let jar = self.jar.as_ref()?;
        jar.cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Installs the session's cookie store on a client builder.
    pub(crate) fn install(&self, builder: ClientBuilder) -> ClientBuilder {
        match &self.jar {
            Some(jar) => {
                debug!("installing shared cookie jar");
                builder.cookie_provider(Arc::clone(jar))
            }
            None => {
                debug!("cookie isolation enabled; client has no cookie store");
                builder
            }
        }
    }
}
