//! Integration tests for the scraper client request pipeline.
//!
//! A wiremock server stands in for the remote site. Transport failures are
//! produced by stalling responses past the per-request timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderValue, USER_AGENT};
use scraper_client::config::ClientConfig;
use scraper_client::fetch::{
    FailureType, PageRequest, PageSource, RequestError, ScraperClient, TransportError,
    classify_error,
};
use scraper_client::metrics::{InMemoryMetrics, MetricsError, MetricsRecorder};
use wiremock::matchers::{body_string, header, method, path, path_regex};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

mod support;
use support::start_mock_server_or_skip;

const STALL: Duration = Duration::from_secs(2);
const ATTEMPT_TIMEOUT: Duration = Duration::from_millis(150);

/// Stalls the first `failures` calls past the client timeout, then answers.
struct FlakyResponder {
    calls: Arc<AtomicUsize>,
    failures: usize,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(STALL)
        } else {
            ResponseTemplate::new(200).set_body_string("page body")
        }
    }
}

#[derive(Debug)]
struct BrokenRecorder;

impl MetricsRecorder for BrokenRecorder {
    fn observe_request(&self, _: &str, _: Duration) -> Result<(), MetricsError> {
        Err(MetricsError::Backend("registry unavailable".to_string()))
    }

    fn observe_yield(&self, _: &str, _: &str, _: u64) -> Result<(), MetricsError> {
        Err(MetricsError::Backend("registry unavailable".to_string()))
    }
}

/// Retries enabled with zero backoff; robots off so only page traffic is counted.
fn retrying_config(max_attempts: u32) -> ClientConfig {
    ClientConfig::default()
        .with_retry(max_attempts, 0.0, 0.0)
        .with_respect_robots(false)
}

async fn mount_flaky_page(server: &MockServer, failures: usize) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(FlakyResponder {
            calls: Arc::clone(&calls),
            failures,
        })
        .mount(server)
        .await;
    calls
}

async fn mount_robots(server: &MockServer, template: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(template)
        .expect(expected)
        .mount(server)
        .await;
}

fn timed_get(url: &str) -> PageRequest {
    PageRequest::get(url).timeout(ATTEMPT_TIMEOUT)
}

// ==================== Retry Tests ====================

async fn assert_succeeds_on_attempt(max_attempts: u32) {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let failures = usize::try_from(max_attempts.saturating_sub(1)).unwrap();
    let calls = mount_flaky_page(&mock_server, failures).await;
    let client = ScraperClient::new(retrying_config(max_attempts)).unwrap();

    let response = client
        .send(timed_get(&format!("{}/page", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "page body");
    assert_eq!(
        calls.load(Ordering::SeqCst),
        usize::try_from(max_attempts).unwrap()
    );
    assert_eq!(client.run_request_count(), u64::from(max_attempts));
}

#[tokio::test]
async fn test_single_attempt_budget_succeeds_first_time() {
    assert_succeeds_on_attempt(1).await;
}

#[tokio::test]
async fn test_two_attempts_after_one_timeout() {
    assert_succeeds_on_attempt(2).await;
}

#[tokio::test]
async fn test_four_attempts_after_three_timeouts() {
    assert_succeeds_on_attempt(4).await;
}

#[tokio::test]
async fn test_retry_budget_exhausted_reports_root_cause() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let calls = mount_flaky_page(&mock_server, usize::MAX).await;
    let client = ScraperClient::new(retrying_config(3)).unwrap();

    let err = client
        .send(timed_get(&format!("{}/page", mock_server.uri())))
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), Some(3));
    assert!(matches!(err, RequestError::RetryExhausted { .. }));
    assert!(matches!(
        err.transport(),
        Some(TransportError::Timeout { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_disabled_policy_surfaces_first_failure() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    let calls = mount_flaky_page(&mock_server, usize::MAX).await;
    let client = ScraperClient::new(retrying_config(0)).unwrap();

    let err = client
        .send(timed_get(&format!("{}/page", mock_server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RequestError::Transport(TransportError::Timeout { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The client error behind the timeout is kept.
    let transport = err.transport().unwrap();
    let cause = std::error::Error::source(transport).unwrap();
    assert!(
        cause
            .downcast_ref::<reqwest::Error>()
            .is_some_and(reqwest::Error::is_timeout)
    );
}

#[tokio::test]
async fn test_http_error_status_is_not_retried() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;
    let client = ScraperClient::new(retrying_config(3)).unwrap();

    let response = client
        .get(&format!("{}/broken", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert!(!response.is_blocked_by_robots());
    assert!(matches!(
        response.error_for_status(),
        Err(RequestError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_redirect_loop_stops_at_hop_limit_without_retrying() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/docs/ssl-guide"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/docs/ssl-guide"))
        .mount(&mock_server)
        .await;
    let client = ScraperClient::new(retrying_config(3).with_follow_redirects(true)).unwrap();

    let err = client
        .get(&format!("{}/docs/ssl-guide", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            RequestError::Transport(TransportError::TooManyRedirects { limit: 10, .. })
        ),
        "unexpected error: {err:?}"
    );
    // The first request plus ten hops, one attempt each.
    assert_eq!(client.run_request_count(), 11);
}

// ==================== Error Classification Tests ====================

#[tokio::test]
async fn test_redirect_error_with_tls_words_in_url_is_permanent() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/docs/ssl-guide"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/docs/ssl-guide"))
        .mount(&mock_server)
        .await;
    let url = format!("{}/docs/ssl-guide", mock_server.uri());

    // A plain reqwest client follows redirects itself and fails with a redirect error.
    let source = reqwest::Client::new().get(&url).send().await.unwrap_err();
    assert!(source.is_redirect());

    let error = TransportError::from_reqwest(&url, source);
    assert!(matches!(error, TransportError::Other { .. }), "{error:?}");
    assert_eq!(classify_error(&error), FailureType::Permanent);
}

#[tokio::test]
async fn test_connect_error_with_proxy_words_in_url_is_connect() {
    // Port 9 (discard) on localhost is closed in test environments.
    let url = "http://127.0.0.1:9/proxy/tls-handshake";
    let source = reqwest::Client::new().get(url).send().await.unwrap_err();

    let error = TransportError::from_reqwest(url, source);
    assert!(matches!(error, TransportError::Connect { .. }), "{error:?}");
    assert_eq!(classify_error(&error), FailureType::Transient);
}

// ==================== Redirect Tests ====================

async fn mount_redirect_site(server: &MockServer) {
    mount_robots(
        server,
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/private/secret"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/public/landing"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landing"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_redirects_are_returned_unfollowed_by_default() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_redirect_site(&mock_server).await;
    let client = ScraperClient::new(ClientConfig::default()).unwrap();

    let response = client
        .get(&format!("{}/go", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status(), 302);
    assert!(!response.is_blocked_by_robots());
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/private/secret"
    );
}

#[tokio::test]
async fn test_followed_redirect_into_disallowed_path_is_blocked() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_redirect_site(&mock_server).await;
    let client = ScraperClient::new(ClientConfig::default().with_follow_redirects(true)).unwrap();

    let blocked = client
        .get(&format!("{}/go", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(blocked.status(), 403);
    assert!(blocked.is_blocked_by_robots());
    assert_eq!(blocked.url(), format!("{}/private/secret", mock_server.uri()));

    let landing = client
        .get(&format!("{}/moved", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(landing.status(), 200);
    assert_eq!(landing.text(), "landing");
    assert_eq!(landing.url(), format!("{}/public/landing", mock_server.uri()));
    assert_eq!(client.robots().unwrap().fetch_count(), 1);
}

// ==================== Robots Tests ====================

#[tokio::test]
async fn test_robots_disallowed_path_returns_synthetic_403() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_robots(
        &mock_server,
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/public/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    let client = ScraperClient::new(ClientConfig::default()).unwrap();

    let blocked = client
        .get(&format!("{}/private/page", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(blocked.status(), 403);
    assert!(blocked.is_blocked_by_robots());

    let allowed = client
        .get(&format!("{}/public/page", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(allowed.status(), 200);
    assert_eq!(allowed.text(), "hello");
    assert_eq!(client.robots().unwrap().fetch_count(), 1);
}

#[tokio::test]
async fn test_robots_403_disallows_every_path() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_robots(&mock_server, ResponseTemplate::new(403), 1).await;
    Mock::given(method("GET"))
        .and(path_regex("^/(public|private)/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    let client = ScraperClient::new(ClientConfig::default()).unwrap();

    for target in ["/public/a", "/private/b", "/public/c?x=1"] {
        let response = client
            .get(&format!("{}{target}", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status(), 403, "{target}");
        assert!(response.is_blocked_by_robots(), "{target}");
    }
}

#[tokio::test]
async fn test_robots_fetch_failure_fails_open() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    // Disallow-all body that never arrives in time: both robots attempts time out.
    mount_robots(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_string("User-agent: *\nDisallow: /\n")
            .set_delay(STALL),
        2,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_string("article"))
        .expect(1)
        .mount(&mock_server)
        .await;
    let config = ClientConfig::default()
        .with_retry(0, 0.0, 0.0)
        .with_robots_max_attempts(2);
    let client = ScraperClient::builder(config)
        .robots_fetch_timeout(ATTEMPT_TIMEOUT)
        .build()
        .unwrap();

    let response = client
        .get(&format!("{}/article", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(!response.is_blocked_by_robots());
}

#[tokio::test]
async fn test_robots_missing_allows_all() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_robots(&mock_server, ResponseTemplate::new(404), 1).await;
    Mock::given(method("GET"))
        .and(path("/anything"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    let client = ScraperClient::new(ClientConfig::default()).unwrap();

    let response = client
        .get(&format!("{}/anything", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_ignore_robots_bypasses_authorizer() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_robots(
        &mock_server,
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"),
        0,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    let client = ScraperClient::new(ClientConfig::default()).unwrap();

    let response = client
        .send(PageRequest::get(format!("{}/page", mock_server.uri())).ignore_robots(true))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(!response.is_blocked_by_robots());
    assert_eq!(client.robots().unwrap().fetch_count(), 0);
}

#[tokio::test]
async fn test_robots_group_follows_request_user_agent() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    // One fetch per distinct user agent.
    mount_robots(
        &mock_server,
        ResponseTemplate::new(200).set_body_string(
            "User-agent: newsbot\nDisallow: /drafts/\n\nUser-agent: *\nDisallow: /\n",
        ),
        2,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .and(header("user-agent", "NewsBot/1.0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    let client = ScraperClient::new(ClientConfig::default().with_user_agent("NewsBot/1.0")).unwrap();
    let about = format!("{}/about", mock_server.uri());

    let allowed = client.get(&about).await.unwrap();
    assert_eq!(allowed.status(), 200);

    let drafts = client
        .get(&format!("{}/drafts/x", mock_server.uri()))
        .await
        .unwrap();
    assert!(drafts.is_blocked_by_robots());

    let other_agent = client
        .send(PageRequest::get(&about).header(USER_AGENT, HeaderValue::from_static("OtherBot/3.1")))
        .await
        .unwrap();
    assert!(other_agent.is_blocked_by_robots());
    assert_eq!(client.robots().unwrap().cached_entries(), 2);
}

#[tokio::test]
async fn test_concurrent_first_lookups_share_one_robots_fetch() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_robots(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_string("User-agent: *\nDisallow: /private/\n")
            .set_delay(Duration::from_millis(300)),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path_regex("^/page/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(8)
        .mount(&mock_server)
        .await;
    let client = Arc::new(ScraperClient::new(ClientConfig::default()).unwrap());

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let client = Arc::clone(&client);
        let url = format!("{}/page/{i}", mock_server.uri());
        tasks.spawn(async move { client.get(&url).await });
    }
    while let Some(joined) = tasks.join_next().await {
        let response = joined.unwrap().unwrap();
        assert_eq!(response.status(), 200);
    }

    assert_eq!(client.robots().unwrap().fetch_count(), 1);
    assert_eq!(client.robots().unwrap().cached_entries(), 1);
}

// ==================== Cookie Tests ====================

async fn mount_cookie_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "sid=abc123; Path=/"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn cookie_header_of_next(server: &MockServer) -> Option<String> {
    let requests = server.received_requests().await.unwrap();
    let next = requests
        .iter()
        .find(|request| request.url.path() == "/next")
        .unwrap();
    next.headers
        .get("cookie")
        .map(|value| value.to_str().unwrap().to_string())
}

#[tokio::test]
async fn test_isolated_cookies_are_not_sent_on_next_request() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_cookie_site(&mock_server).await;
    let client = ScraperClient::new(ClientConfig::default().with_respect_robots(false)).unwrap();

    client
        .get(&format!("{}/login", mock_server.uri()))
        .await
        .unwrap();
    client
        .get(&format!("{}/next", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(cookie_header_of_next(&mock_server).await, None);
}

#[tokio::test]
async fn test_persistent_cookies_accumulate() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_cookie_site(&mock_server).await;
    let config = ClientConfig::default()
        .with_respect_robots(false)
        .with_persist_cookies(true);
    let client = ScraperClient::new(config).unwrap();

    client
        .get(&format!("{}/login", mock_server.uri()))
        .await
        .unwrap();
    client
        .get(&format!("{}/next", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(
        cookie_header_of_next(&mock_server).await.as_deref(),
        Some("sid=abc123")
    );
    let origin = url::Url::parse(&mock_server.uri()).unwrap();
    assert_eq!(
        client.cookies().cookie_header(&origin).as_deref(),
        Some("sid=abc123")
    );
}

#[tokio::test]
async fn test_retried_attempts_carry_no_cookies_when_isolated() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_cookie_site(&mock_server).await;
    mount_flaky_page(&mock_server, 2).await;
    let client = ScraperClient::new(retrying_config(3)).unwrap();

    client
        .get(&format!("{}/login", mock_server.uri()))
        .await
        .unwrap();
    let response = client
        .send(timed_get(&format!("{}/page", mock_server.uri())))
        .await
        .unwrap();
    assert_eq!(response.text(), "page body");

    let requests = mock_server.received_requests().await.unwrap();
    let attempts: Vec<_> = requests
        .iter()
        .filter(|request| request.url.path() == "/page")
        .collect();
    assert_eq!(attempts.len(), 3);
    for attempt in attempts {
        assert!(attempt.headers.get("cookie").is_none());
    }
}

// ==================== Metrics Tests ====================

#[tokio::test]
async fn test_metrics_recorded_per_completed_request() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_robots(
        &mock_server,
        ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;
    let recorder = Arc::new(InMemoryMetrics::new());
    let client = ScraperClient::builder(ClientConfig::default().with_scraper_id("news"))
        .metrics(recorder.clone())
        .build()
        .unwrap();
    let ok = format!("{}/ok", mock_server.uri());

    client.get(&ok).await.unwrap();
    client.get(&ok).await.unwrap();
    let blocked = client
        .get(&format!("{}/private", mock_server.uri()))
        .await
        .unwrap();
    assert!(blocked.is_blocked_by_robots());
    client.record_yield("article", 12);

    let snapshot = recorder.snapshot("news").unwrap();
    assert_eq!(snapshot.requests, 2);
    assert_eq!(snapshot.latency.count, 2);
    assert_eq!(recorder.yield_snapshot("news", "article").unwrap().count, 1);

    assert_eq!(client.finish_run(), 2);
    assert_eq!(recorder.snapshot("news").unwrap().run_requests.count, 1);
}

#[tokio::test]
async fn test_metrics_backend_failure_does_not_fail_request() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .expect(1)
        .mount(&mock_server)
        .await;
    let client = ScraperClient::builder(
        ClientConfig::default()
            .with_scraper_id("news")
            .with_respect_robots(false),
    )
    .metrics(Arc::new(BrokenRecorder))
    .build()
    .unwrap();

    let response = client
        .get(&format!("{}/ok", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(response.text(), "fine");
    client.record_yield("article", 1);
}

// ==================== Request Shape Tests ====================

#[tokio::test]
async fn test_default_headers_and_post_body_are_sent() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("accept-language", "en-US,en;q=0.9"))
        .and(header("user-agent", "QuoteBot/0.3"))
        .and(body_string("q=rust"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"hits":3}"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    let config = ClientConfig::default()
        .with_respect_robots(false)
        .with_user_agent("QuoteBot/0.3")
        .with_default_header("Accept-Language", "en-US,en;q=0.9");
    let client = ScraperClient::new(config).unwrap();

    let response = client
        .post(&format!("{}/search", mock_server.uri()), "q=rust")
        .await
        .unwrap();
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["hits"], 3);
}

#[tokio::test]
async fn test_client_usable_as_page_source() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/story"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>story</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;
    let client = ScraperClient::new(ClientConfig::default().with_respect_robots(false)).unwrap();
    let source: &dyn PageSource = &client;

    let page = source
        .fetch_page(&format!("{}/story", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(page.text(), "<p>story</p>");
}
