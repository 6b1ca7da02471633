//! Shared helpers for the integration tests.

use std::net::TcpListener;

use wiremock::MockServer;

/// Starts a wiremock server, or returns `None` where localhost sockets cannot be bound.
///
/// Set `SCRAPER_REQUIRE_SOCKET_TESTS=1` to turn the skip into a failure.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return Some(MockServer::start().await);
    }
    let required = std::env::var("SCRAPER_REQUIRE_SOCKET_TESTS")
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    assert!(
        !required,
        "cannot bind a localhost socket; wiremock-based tests cannot run here"
    );
    eprintln!("cannot bind a localhost socket; skipping wiremock-based test");
    None
}
