//! Resilient HTTP fetching for scrapers.
//!
//! [`ScraperClient`] composes the policies in this module around a single
//! "send one request" operation.
//!
//! # Features
//!
//! - Randomized exponential backoff for transport failures only ([`BackoffPolicy`])
//! - Cached robots.txt authorization with single-flight fetches ([`RobotsAuthorizer`])
//! - Per-client cookie isolation or persistence ([`CookiePolicy`])
//! - Best-effort request metrics through an injected recorder
//!
//! # Example
//!
//! ```no_run
//! use scraper_client::config::ClientConfig;
//! use scraper_client::fetch::{PageRequest, ScraperClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScraperClient::new(ClientConfig::default().with_retry(3, 1.0, 5.0))?;
//! let response = client
//!     .send(PageRequest::get("https://example.com/private/page"))
//!     .await?;
//! if response.is_blocked_by_robots() {
//!     println!("skipped by robots.txt");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod cookies;
mod error;
mod request;
mod retry;
pub mod robots;

pub use client::{PageSource, ScraperClient, ScraperClientBuilder};
pub use cookies::{CookiePolicy, CookieSession};
pub use error::{ClientBuildError, RequestError, TransportError};
pub use request::{PageRequest, PageResponse};
pub use retry::{BackoffPolicy, FailureType, RetryDecision, RetryFailure, classify_error};
pub use robots::{RobotsAuthorizer, RobotsRuleSet, origin_for_robots};

// Note: no module-local Result aliases; spell out `Result<T, RequestError>`.
