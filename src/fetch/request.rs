//! Outbound request description and the buffered response handed back to callers.

use std::time::Duration;

use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue,
    LOCATION, PROXY_AUTHORIZATION,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::RequestError;

/// One logical HTTP request.
///
/// Built with the chained setters, then passed to
/// [`ScraperClient::send`](super::ScraperClient::send).
#[derive(Debug, Clone)]
pub struct PageRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
    ignore_robots: bool,
}

impl PageRequest {
    /// Creates a request with no extra headers, no body and robots enforcement on.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            ignore_robots: false,
        }
    }

    /// Shorthand for a `GET` request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Shorthand for a `POST` request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adds a header, replacing any previous value for the same name.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merges a header map into the request's headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Overrides the client's per-attempt timeout for this request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skips the robots.txt check for this request.
    #[must_use]
    pub fn ignore_robots(mut self, ignore: bool) -> Self {
        self.ignore_robots = ignore;
        self
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL as given.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Per-request headers (client defaults are applied on top by the transport).
    #[must_use]
    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    /// The request body, if any.
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The per-request timeout override, if any.
    #[must_use]
    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the robots.txt check is skipped.
    #[must_use]
    pub fn robots_ignored(&self) -> bool {
        self.ignore_robots
    }

    /// The `User-Agent` header set on this request, if it is valid text.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
    }

    /// Rewrites the request for one redirect hop to `target`.
    ///
    /// 301, 302 and 303 turn into a bodiless `GET` (`HEAD` stays `HEAD`);
    /// 307 and 308 keep method and body. Credentials are dropped when the
    /// hop leaves the current origin.
    pub(crate) fn into_redirect(mut self, status: StatusCode, from: &Url, target: &Url) -> Self {
        let rewrites_method = matches!(
            status,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
        );
        if rewrites_method && self.method != Method::HEAD {
            self.method = Method::GET;
            self.body = None;
            self.headers.remove(CONTENT_TYPE);
            self.headers.remove(CONTENT_LENGTH);
        }
        if from.origin() != target.origin() {
            self.headers.remove(AUTHORIZATION);
            self.headers.remove(PROXY_AUTHORIZATION);
            self.headers.remove(COOKIE);
        }
        self.url = target.to_string();
        self
    }
}

/// A fully buffered response.
///
/// Responses synthesized for robots exclusion carry status 403, an empty body
/// and [`is_blocked_by_robots`](Self::is_blocked_by_robots) set, so callers can
/// tell policy denial apart from a server-sent 403.
#[derive(Debug, Clone)]
pub struct PageResponse {
    url: String,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    blocked_by_robots: bool,
    elapsed: Duration,
}

impl PageResponse {
    pub(crate) fn new(
        url: String,
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<u8>,
        elapsed: Duration,
    ) -> Self {
        Self {
            url,
            status,
            headers,
            body,
            blocked_by_robots: false,
            elapsed,
        }
    }

    /// The synthetic 403 returned when robots.txt denies `url`.
    #[must_use]
    pub fn forbidden_by_robots(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: StatusCode::FORBIDDEN,
            headers: HeaderMap::new(),
            body: Vec::new(),
            blocked_by_robots: true,
            elapsed: Duration::ZERO,
        }
    }

    /// The response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The URL that produced this response (the last hop when redirects are followed).
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wall-clock time of the successful attempt, send through body read.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether this response was synthesized because robots.txt denied the URL.
    #[must_use]
    pub fn is_blocked_by_robots(&self) -> bool {
        self.blocked_by_robots
    }

    /// The raw body.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the response, returning the raw body.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The absolute target of a redirect response, resolved against `base`.
    ///
    /// `None` for non-redirect statuses and missing or unusable `Location` headers.
    pub(crate) fn redirect_target(&self, base: &Url) -> Option<Url> {
        if !matches!(
            self.status,
            StatusCode::MOVED_PERMANENTLY
                | StatusCode::FOUND
                | StatusCode::SEE_OTHER
                | StatusCode::TEMPORARY_REDIRECT
                | StatusCode::PERMANENT_REDIRECT
        ) {
            return None;
        }
        let location = self.headers.get(LOCATION)?.to_str().ok()?;
        base.join(location.trim())
            .ok()
            .filter(|target| matches!(target.scheme(), "http" | "https"))
    }

    /// Returns `self` for 1xx-3xx statuses and [`RequestError::Status`] otherwise.
    ///
    /// # Errors
    ///
    /// Any 4xx or 5xx status, including the synthetic robots 403.
    pub fn error_for_status(self) -> Result<Self, RequestError> {
        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(RequestError::Status {
                url: self.url,
                status: self.status.as_u16(),
            });
        }
        Ok(self)
    }
}
