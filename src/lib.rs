//! Scraper Client Library
//!
//! A resilient HTTP client for web scrapers: bounded, randomized retries for
//! transport failures, robots.txt compliance with a shared per-origin cache,
//! cookie isolation between requests, and per-scraper request metrics.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - The request pipeline and its retry, robots and cookie policies
//! - [`metrics`] - The injected metrics recorder seam and an in-memory recorder
//! - [`config`] - Construction-time configuration (code, JSON file or environment)
//! - [`user_agent`] - Default User-Agent and browser-like crawl headers

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fetch;
pub mod metrics;
pub mod user_agent;

// Re-export commonly used types
pub use config::{ClientConfig, ConfigError};
pub use fetch::{
    BackoffPolicy, ClientBuildError, CookiePolicy, FailureType, PageRequest, PageResponse,
    PageSource, RequestError, RobotsAuthorizer, RobotsRuleSet, ScraperClient, TransportError,
    classify_error,
};
pub use metrics::{InMemoryMetrics, MetricsError, MetricsRecorder};
