//! Randomized exponential backoff around transport-level failures.
//!
//! [`BackoffPolicy`] wraps a zero-argument async operation (one network
//! attempt) and re-runs it while the failure is classified as
//! [`FailureType::Transient`] and attempts remain.
//!
//! # Classification
//!
//! Only transport failures are retried: connection failures, timeouts, proxy
//! failures, malformed protocol responses and TLS failures. HTTP error statuses
//! are successful responses as far as this policy is concerned.
//!
//! # Delay Calculation
//!
//! After the n-th failed attempt (1-indexed):
//!
//! ```text
//! delay = min(cap, uniform(0, multiplier * 2^(n-1)))
//! ```
//!
//! # Example
//!
//! ```
//! use scraper_client::fetch::{BackoffPolicy, TransportError};
//!
//! # async fn example() -> Result<(), TransportError> {
//! let policy = BackoffPolicy::new(3, 0.5, 4.0);
//! let value = policy.execute(|| async { Ok::<_, TransportError>(42) }).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::TransportError;
use super::constants::{DEFAULT_BACKOFF_CAP_SECS, DEFAULT_BACKOFF_MULTIPLIER};

/// Exponent ceiling; `2^62` seconds already saturates any sane cap.
const MAX_EXPONENT: i32 = 62;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on retry (connect, timeout, proxy, protocol, TLS).
    Transient,

    /// Retrying cannot help (invalid URL, redirect loop, body decoding).
    Permanent,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Outcome of a run whose every allowed attempt failed.
#[derive(Debug)]
pub struct RetryFailure {
    /// Attempts performed, including the first.
    pub attempts: u32,
    /// Classification of the final error.
    pub failure_type: FailureType,
    /// The final attempt's error, unmodified.
    pub error: TransportError,
}

/// Retry configuration with randomized exponential backoff.
///
/// `max_attempts` of 0 or 1 disables retrying: the operation runs exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    multiplier: f64,
    cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl BackoffPolicy {
    /// Creates a policy.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Total attempts including the first (0 and 1 both mean no retry)
    /// * `multiplier_secs` - Scale of the exponential window, in seconds
    /// * `cap_secs` - Upper bound for any single delay, in seconds
    ///
    /// Negative or non-finite durations are clamped to zero.
    #[must_use]
    pub fn new(max_attempts: u32, multiplier_secs: f64, cap_secs: f64) -> Self {
        Self {
            max_attempts,
            multiplier: sanitize_secs(multiplier_secs),
            cap: Duration::from_secs_f64(sanitize_secs(cap_secs)),
        }
    }

    /// A single-attempt policy.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BACKOFF_CAP_SECS)
    }

    /// Returns the configured `max_attempts` value as given.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the number of attempts a run may actually perform.
    #[must_use]
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Returns whether the policy ever retries.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Returns the delay cap.
    #[must_use]
    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.attempt_budget() {
            debug!(attempt, max = self.attempt_budget(), "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.attempt_budget()),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Runs `operation` until it succeeds or the budget is spent, returning the
    /// final error unmodified on failure.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's [`TransportError`].
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.run(operation).await.map_err(|failure| failure.error)
    }

    /// Like [`execute`](Self::execute) but reports how many attempts were made.
    ///
    /// Backoff sleeps suspend only the calling task. Dropping the returned
    /// future stops retrying immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`RetryFailure`] carrying the last error and the attempt count.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            match self.should_retry(failure_type, attempt) {
                RetryDecision::Retry { delay, .. } => {
                    debug!(error = %error, attempt, "retryable transport failure");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(error = %error, attempt, reason = %reason, "not retrying");
                    return Err(RetryFailure {
                        attempts: attempt,
                        failure_type,
                        error,
                    });
                }
            }
        }
    }

    /// `min(cap, uniform(0, multiplier * 2^(attempt-1)))`.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1))
            .unwrap_or(MAX_EXPONENT)
            .min(MAX_EXPONENT);
        let window = self.multiplier * 2f64.powi(exponent);
        let sampled = if window > 0.0 && window.is_finite() {
            rand::thread_rng().gen_range(0.0..=window)
        } else {
            0.0
        };
        Duration::from_secs_f64(sampled.min(self.cap.as_secs_f64()))
    }
}

fn sanitize_secs(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs.min(u32::MAX.into())
    } else {
        0.0
    }
}

/// Classifies a transport error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Connect | Transient |
/// | Timeout | Transient |
/// | Proxy | Transient |
/// | Protocol | Transient |
/// | Tls | Transient |
/// | TooManyRedirects | Permanent |
/// | Other | Permanent |
/// | InvalidUrl | Permanent |
#[must_use]
pub fn classify_error(error: &TransportError) -> FailureType {
    match error {
        TransportError::Connect { .. }
        | TransportError::Timeout { .. }
        | TransportError::Proxy { .. }
        | TransportError::Protocol { .. }
        | TransportError::Tls { .. } => FailureType::Transient,
        TransportError::TooManyRedirects { .. }
        | TransportError::Other { .. }
        | TransportError::InvalidUrl { .. } => FailureType::Permanent,
    }
}
