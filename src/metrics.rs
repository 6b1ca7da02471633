//! Per-scraper request metrics.
//!
//! The pipeline reports through the [`MetricsRecorder`] trait, injected at
//! client construction. [`InMemoryMetrics`] is the bundled implementation:
//! counters and fixed-bucket histograms keyed by scraper id, readable through
//! [`InMemoryMetrics::snapshot`].
//!
//! Recording is best-effort. Recorder errors are logged by
//! [`record_request`] / [`record_yield`] and never reach the caller of a request.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tracing::warn;

/// Upper bounds (seconds / units) of the histogram buckets; an implicit
/// overflow bucket follows the last bound.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// A metrics backend rejected an observation.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Backend-specific failure.
    #[error("metrics backend error: {0}")]
    Backend(String),
}

/// Sink for request and yield observations.
pub trait MetricsRecorder: Send + Sync + std::fmt::Debug {
    /// Records one completed request and its latency.
    ///
    /// # Errors
    ///
    /// Backend failures; callers swallow them.
    fn observe_request(&self, scraper_id: &str, elapsed: Duration) -> Result<(), MetricsError>;

    /// Records how many data points of `data_type` a crawl produced.
    ///
    /// # Errors
    ///
    /// Backend failures; callers swallow them.
    fn observe_yield(
        &self,
        scraper_id: &str,
        data_type: &str,
        amount: u64,
    ) -> Result<(), MetricsError>;

    /// Records how many requests one scraper run issued.
    ///
    /// # Errors
    ///
    /// Backend failures; callers swallow them.
    fn observe_run_requests(&self, scraper_id: &str, count: u64) -> Result<(), MetricsError> {
        let _ = (scraper_id, count);
        Ok(())
    }
}

/// Records a request observation, skipping absent ids and swallowing backend errors.
pub fn record_request(
    recorder: Option<&dyn MetricsRecorder>,
    scraper_id: Option<&str>,
    elapsed: Duration,
) {
    let (Some(recorder), Some(scraper_id)) = (recorder, non_empty(scraper_id)) else {
        return;
    };
    if let Err(error) = recorder.observe_request(scraper_id, elapsed) {
        warn!(scraper_id, error = %error, "failed to record request metrics");
    }
}

/// Records a yield observation, skipping absent ids and swallowing backend errors.
pub fn record_yield(
    recorder: Option<&dyn MetricsRecorder>,
    scraper_id: Option<&str>,
    data_type: &str,
    amount: u64,
) {
    let (Some(recorder), Some(scraper_id)) = (recorder, non_empty(scraper_id)) else {
        return;
    };
    if let Err(error) = recorder.observe_yield(scraper_id, data_type, amount) {
        warn!(scraper_id, data_type, error = %error, "failed to record yield metrics");
    }
}

/// Records a per-run request count, skipping absent ids and swallowing backend errors.
pub fn record_run_requests(
    recorder: Option<&dyn MetricsRecorder>,
    scraper_id: Option<&str>,
    count: u64,
) {
    let (Some(recorder), Some(scraper_id)) = (recorder, non_empty(scraper_id)) else {
        return;
    };
    if let Err(error) = recorder.observe_run_requests(scraper_id, count) {
        warn!(scraper_id, error = %error, "failed to record run metrics");
    }
}

fn non_empty(scraper_id: Option<&str>) -> Option<&str> {
    scraper_id.filter(|id| !id.is_empty())
}

/// Lock-free fixed-bucket histogram.
#[derive(Debug)]
struct Histogram {
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    /// Sum of observations in millionths, so it fits an atomic integer.
    sum_micros: AtomicU64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            buckets: (0..=DEFAULT_BUCKETS.len())
                .map(|_| AtomicU64::new(0))
                .collect(),
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn observe(&self, value: f64) {
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        let index = DEFAULT_BUCKETS
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(DEFAULT_BUCKETS.len());
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((value * 1_000_000.0) as u64, Ordering::Relaxed);
    }

    #[allow(clippy::cast_precision_loss)]
    fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            bounds: DEFAULT_BUCKETS.to_vec(),
            counts: self
                .buckets
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect(),
            count: self.count.load(Ordering::Relaxed),
            sum: self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Point-in-time view of one histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// Bucket upper bounds.
    pub bounds: Vec<f64>,
    /// Per-bucket (non-cumulative) counts; one longer than `bounds` for overflow.
    pub counts: Vec<u64>,
    /// Total observations.
    pub count: u64,
    /// Sum of observed values.
    pub sum: f64,
}

/// Point-in-time view of one scraper's request metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperMetricsSnapshot {
    /// Monotonic count of completed requests.
    pub requests: u64,
    /// Request latency distribution in seconds.
    pub latency: HistogramSnapshot,
    /// Requests issued per run.
    pub run_requests: HistogramSnapshot,
}

#[derive(Debug)]
struct ScraperSeries {
    requests: AtomicU64,
    latency: Histogram,
    run_requests: Histogram,
}

impl ScraperSeries {
    fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            latency: Histogram::new(),
            run_requests: Histogram::new(),
        }
    }
}

/// In-process metrics registry owned by the host application.
///
/// Share one instance (`Arc<InMemoryMetrics>`) between clients to aggregate
/// across them.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    scrapers: DashMap<String, Arc<ScraperSeries>>,
    yields: DashMap<(String, String), Arc<Histogram>>,
}

impl InMemoryMetrics {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn series(&self, scraper_id: &str) -> Arc<ScraperSeries> {
        self.scrapers
            .entry(scraper_id.to_string())
            .or_insert_with(|| Arc::new(ScraperSeries::new()))
            .clone()
    }

    /// Returns the request metrics recorded for `scraper_id`.
    #[must_use]
    pub fn snapshot(&self, scraper_id: &str) -> Option<ScraperMetricsSnapshot> {
        let series = self.scrapers.get(scraper_id)?;
        Some(ScraperMetricsSnapshot {
            requests: series.requests.load(Ordering::Relaxed),
            latency: series.latency.snapshot(),
            run_requests: series.run_requests.snapshot(),
        })
    }

    /// Returns the yield distribution for `(scraper_id, data_type)`.
    #[must_use]
    pub fn yield_snapshot(&self, scraper_id: &str, data_type: &str) -> Option<HistogramSnapshot> {
        self.yields
            .get(&(scraper_id.to_string(), data_type.to_string()))
            .map(|h| h.snapshot())
    }

    /// Scraper ids that have recorded at least one observation.
    #[must_use]
    pub fn scraper_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.scrapers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl MetricsRecorder for InMemoryMetrics {
    fn observe_request(&self, scraper_id: &str, elapsed: Duration) -> Result<(), MetricsError> {
        let series = self.series(scraper_id);
        series.requests.fetch_add(1, Ordering::Relaxed);
        series.latency.observe(elapsed.as_secs_f64());
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn observe_yield(
        &self,
        scraper_id: &str,
        data_type: &str,
        amount: u64,
    ) -> Result<(), MetricsError> {
        let histogram = self
            .yields
            .entry((scraper_id.to_string(), data_type.to_string()))
            .or_insert_with(|| Arc::new(Histogram::new()))
            .clone();
        histogram.observe(amount as f64);
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn observe_run_requests(&self, scraper_id: &str, count: u64) -> Result<(), MetricsError> {
        self.series(scraper_id).run_requests.observe(count as f64);
        Ok(())
    }
}
