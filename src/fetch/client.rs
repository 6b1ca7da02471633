//! The request pipeline façade.
//!
//! One [`ScraperClient::send`] call runs:
//!
//! 1. URL parsing (failure is a non-retryable [`TransportError::InvalidUrl`])
//! 2. robots.txt authorization, unless disabled or the request opts out;
//!    a denial returns [`PageResponse::forbidden_by_robots`]
//! 3. the send, wrapped in the client's [`BackoffPolicy`]; cookie isolation
//!    applies to every attempt because the isolated client has no cookie store
//! 4. metrics recording for the successful attempt
//! 5. when redirects are followed, steps 2-4 again for each hop

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, redirect};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{MAX_REDIRECTS, ROBOTS_MAX_REDIRECTS};
use super::cookies::CookieSession;
use super::error::{ClientBuildError, RequestError, TransportError};
use super::request::{PageRequest, PageResponse};
use super::retry::{BackoffPolicy, FailureType};
use super::robots::RobotsAuthorizer;
use crate::config::{ClientConfig, ConfigError};
use crate::metrics::{self, MetricsRecorder};
use crate::user_agent;

/// Anything that can turn a URL into page bytes or a typed failure.
///
/// Extraction and ranking code depends on this seam rather than on
/// [`ScraperClient`] directly, so it can be exercised with fakes.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches `url` with a `GET`.
    async fn fetch_page(&self, url: &str) -> Result<PageResponse, RequestError>;
}

/// Resilient HTTP client for scrapers.
///
/// Create once per scraper and share (`Arc<ScraperClient>` or `&ScraperClient`)
/// across concurrent tasks; the robots cache and connection pool are reused.
///
/// # Example
///
/// ```no_run
/// use scraper_client::config::ClientConfig;
/// use scraper_client::fetch::ScraperClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::default()
///     .with_scraper_id("news")
///     .with_retry(3, 1.0, 10.0);
/// let client = ScraperClient::new(config)?;
/// let page = client.get("https://example.com/articles").await?;
/// println!("{} bytes", page.bytes().len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScraperClient {
    http: Client,
    robots: Option<RobotsAuthorizer>,
    backoff: BackoffPolicy,
    cookies: CookieSession,
    metrics: Option<Arc<dyn MetricsRecorder>>,
    scraper_id: Option<String>,
    user_agent: String,
    request_timeout: Duration,
    follow_redirects: bool,
    run_requests: AtomicU64,
}

/// Builder for [`ScraperClient`] with the optional collaborators.
#[derive(Debug)]
pub struct ScraperClientBuilder {
    config: ClientConfig,
    metrics: Option<Arc<dyn MetricsRecorder>>,
    cookie_jar: Option<Arc<Jar>>,
    robots_fetch_timeout: Option<Duration>,
}

impl ScraperClientBuilder {
    /// Starts a builder from `config`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            metrics: None,
            cookie_jar: None,
            robots_fetch_timeout: None,
        }
    }

    /// Injects the metrics recorder. Without one, nothing is recorded.
    #[must_use]
    pub fn metrics(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(recorder);
        self
    }

    /// Seeds the client with an existing cookie jar.
    ///
    /// A seeded jar implies persistent cookies regardless of `persist_cookies`.
    #[must_use]
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Overrides the per-attempt robots.txt fetch timeout.
    #[must_use]
    pub fn robots_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.robots_fetch_timeout = Some(timeout);
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    ///
    /// [`ClientBuildError::Config`] for invalid settings or headers,
    /// [`ClientBuildError::Http`] if the HTTP client cannot be constructed.
    #[instrument(level = "debug", skip(self), fields(scraper_id = ?self.config.scraper_id))]
    pub fn build(self) -> Result<ScraperClient, ClientBuildError> {
        let config = self.config;
        config.validate()?;

        let mut default_headers = header_map(&config.default_headers)?;
        let header_agent = default_headers
            .remove(USER_AGENT)
            .and_then(|value| value.to_str().ok().map(str::to_string));
        let agent = config
            .user_agent
            .clone()
            .or(header_agent)
            .unwrap_or_else(user_agent::default_user_agent);
        let agent_value = HeaderValue::from_str(&agent).map_err(|_| ConfigError::Invalid {
            field: "user_agent",
            value: agent.clone(),
            expected: "a valid HTTP header value",
        })?;

        let cookies = match self.cookie_jar {
            Some(jar) => CookieSession::with_jar(jar),
            None => CookieSession::new(config.cookie_policy()),
        };

        let http = cookies
            .install(
                // Redirects are followed by `send`, so each hop passes the robots check.
                base_client_builder(&config, agent_value.clone())
                    .redirect(redirect::Policy::none())
                    .timeout(config.request_timeout())
                    .default_headers(default_headers),
            )
            .build()
            .map_err(ClientBuildError::Http)?;

        // robots.txt traffic never carries cookies or the caller's extra headers.
        let robots = if config.respect_robots {
            let robots_http = base_client_builder(&config, agent_value)
                .redirect(redirect::Policy::limited(ROBOTS_MAX_REDIRECTS))
                .build()
                .map_err(ClientBuildError::Http)?;
            let authorizer = RobotsAuthorizer::new(robots_http, config.robots_policy());
            Some(match self.robots_fetch_timeout {
                Some(timeout) => authorizer.with_fetch_timeout(timeout),
                None => authorizer,
            })
        } else {
            None
        };

        debug!(
            max_attempts = config.max_attempts,
            cookies = ?cookies.policy(),
            respect_robots = config.respect_robots,
            follow_redirects = config.follow_redirects,
            "scraper client ready"
        );

        let backoff = config.backoff_policy();
        let request_timeout = config.request_timeout();
        let follow_redirects = config.follow_redirects;
        Ok(ScraperClient {
            http,
            robots,
            backoff,
            cookies,
            metrics: self.metrics,
            scraper_id: config.scraper_id.filter(|id| !id.is_empty()),
            user_agent: agent,
            request_timeout,
            follow_redirects,
            run_requests: AtomicU64::new(0),
        })
    }
}

impl ScraperClient {
    /// Builds a client without a metrics recorder.
    ///
    /// # Errors
    ///
    /// See [`ScraperClientBuilder::build`].
    pub fn new(config: ClientConfig) -> Result<Self, ClientBuildError> {
        ScraperClientBuilder::new(config).build()
    }

    /// Starts a builder for clients with metrics or a seeded cookie jar.
    #[must_use]
    pub fn builder(config: ClientConfig) -> ScraperClientBuilder {
        ScraperClientBuilder::new(config)
    }

    /// Sends one logical request through the pipeline.
    ///
    /// A URL denied by robots.txt yields `Ok` with a synthetic 403 response
    /// ([`PageResponse::is_blocked_by_robots`]). HTTP error statuses from the
    /// server are returned as responses, never retried.
    ///
    /// Redirects are returned as responses unless the client follows them.
    /// When it does, every hop gets its own robots.txt check and retry budget,
    /// and a denied hop yields the synthetic 403 for the hop's URL.
    ///
    /// # Errors
    ///
    /// - [`RequestError::RetryExhausted`] when retrying is enabled and every
    ///   attempt failed with a retryable transport error
    /// - [`RequestError::Transport`] for non-retryable failures, any failure
    ///   when retrying is disabled, or a redirect chain longer than
    ///   [`MAX_REDIRECTS`] hops
    #[instrument(skip(self, request), fields(method = %request.method(), url = %request.url()))]
    pub async fn send(&self, mut request: PageRequest) -> Result<PageResponse, RequestError> {
        let mut url =
            Url::parse(request.url()).map_err(|_| TransportError::invalid_url(request.url()))?;
        let start_url = request.url().to_string();
        let mut hops = 0;

        loop {
            if !self.authorize(&request, &url).await {
                return Ok(PageResponse::forbidden_by_robots(url.as_str()));
            }
            let response = self.send_with_retry(&request, &url).await?;
            if !self.follow_redirects {
                return Ok(response);
            }
            let Some(target) = response.redirect_target(&url) else {
                return Ok(response);
            };
            if hops == MAX_REDIRECTS {
                warn!(limit = MAX_REDIRECTS, "redirect limit reached");
                return Err(RequestError::Transport(TransportError::TooManyRedirects {
                    url: start_url,
                    limit: MAX_REDIRECTS,
                }));
            }
            hops += 1;
            debug!(status = response.status().as_u16(), to = %target, hop = hops, "following redirect");
            request = request.into_redirect(response.status(), &url, &target);
            url = target;
        }
    }

    /// Checks robots.txt for one hop; `true` when enforcement is off or skipped.
    async fn authorize(&self, request: &PageRequest, url: &Url) -> bool {
        if request.robots_ignored() {
            return true;
        }
        let Some(robots) = &self.robots else {
            return true;
        };
        let agent = request.user_agent().unwrap_or(&self.user_agent);
        let allowed = robots.is_allowed(url.as_str(), Some(agent)).await;
        if !allowed {
            debug!(url = %url, user_agent = agent, "request blocked by robots.txt");
        }
        allowed
    }

    async fn send_with_retry(
        &self,
        request: &PageRequest,
        url: &Url,
    ) -> Result<PageResponse, RequestError> {
        match self.backoff.run(|| self.attempt(request, url)).await {
            Ok(response) => Ok(response),
            Err(failure)
                if failure.failure_type == FailureType::Transient && self.backoff.is_enabled() =>
            {
                warn!(
                    attempts = failure.attempts,
                    error = %failure.error,
                    "retry budget exhausted"
                );
                Err(RequestError::RetryExhausted {
                    url: url.to_string(),
                    attempts: failure.attempts,
                    source: failure.error,
                })
            }
            Err(failure) => {
                debug!(error = %failure.error, "request failed");
                Err(RequestError::Transport(failure.error))
            }
        }
    }

    /// Sends a `GET` for `url`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get(&self, url: &str) -> Result<PageResponse, RequestError> {
        self.send(PageRequest::get(url)).await
    }

    /// Sends a `POST` for `url` with `body`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post(
        &self,
        url: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<PageResponse, RequestError> {
        self.send(PageRequest::post(url).body(body)).await
    }

    /// One network attempt: send, buffer the body, record metrics.
    async fn attempt(&self, request: &PageRequest, url: &Url) -> Result<PageResponse, TransportError> {
        self.run_requests.fetch_add(1, Ordering::Relaxed);

        let mut builder = self
            .http
            .request(request.method().clone(), url.clone())
            .headers(request.header_map().clone())
            .timeout(request.timeout_override().unwrap_or(self.request_timeout));
        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.to_vec());
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;
        let elapsed = started.elapsed();

        metrics::record_request(self.metrics.as_deref(), self.scraper_id.as_deref(), elapsed);
        debug!(status = status.as_u16(), elapsed_ms = elapsed.as_millis(), "response received");

        Ok(PageResponse::new(
            final_url,
            status,
            headers,
            body.to_vec(),
            elapsed,
        ))
    }

    /// Reports the attempts sent since the previous call as one run and resets the tally.
    ///
    /// Returns the reported count.
    pub fn finish_run(&self) -> u64 {
        let count = self.run_requests.swap(0, Ordering::SeqCst);
        metrics::record_run_requests(self.metrics.as_deref(), self.scraper_id.as_deref(), count);
        count
    }

    /// Records crawl yield for `data_type` under this client's scraper id.
    pub fn record_yield(&self, data_type: &str, amount: u64) {
        metrics::record_yield(
            self.metrics.as_deref(),
            self.scraper_id.as_deref(),
            data_type,
            amount,
        );
    }

    /// Attempts sent since the last [`finish_run`](Self::finish_run).
    #[must_use]
    pub fn run_request_count(&self) -> u64 {
        self.run_requests.load(Ordering::SeqCst)
    }

    /// The robots authorizer, absent when robots enforcement is off.
    #[must_use]
    pub fn robots(&self) -> Option<&RobotsAuthorizer> {
        self.robots.as_ref()
    }

    /// The cookie state of this client.
    #[must_use]
    pub fn cookies(&self) -> &CookieSession {
        &self.cookies
    }

    /// The page request backoff policy.
    #[must_use]
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// The User-Agent sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The metrics label, if metrics are enabled.
    #[must_use]
    pub fn scraper_id(&self) -> Option<&str> {
        self.scraper_id.as_deref()
    }
}

#[async_trait]
impl PageSource for ScraperClient {
    async fn fetch_page(&self, url: &str) -> Result<PageResponse, RequestError> {
        self.get(url).await
    }
}

/// Shared settings of the page and robots.txt clients.
fn base_client_builder(config: &ClientConfig, agent: HeaderValue) -> ClientBuilder {
    Client::builder()
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .user_agent(agent)
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| ConfigError::Invalid {
                field: "default_headers",
                value: name.clone(),
                expected: "a valid HTTP header name",
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|_| ConfigError::Invalid {
            field: "default_headers",
            value: format!("{name}: {value}"),
            expected: "a valid HTTP header value",
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
