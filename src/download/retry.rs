//! Retry logic with capped exponential backoff for transient fetch failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying download errors and determining retry behavior, plus the
//! per-fetch attempt state machine that drives them.
//!
//! # Overview
//!
//! When a request fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - service unavailable or a transport failure
//! - [`FailureType::RateLimited`] - the server asked us to slow down (HTTP 429)
//! - [`FailureType::NotFound`] - the resource does not exist; never retried
//! - [`FailureType::Permanent`] - anything else; never retried
//!
//! The [`RetryPolicy`] then decides whether another attempt is allowed and how
//! long to back off first. Attempts run through a small state machine
//! (`Attempting -> Backoff -> Attempting ... -> Succeeded | Exhausted`) so a
//! cancellation can interrupt cleanly while backing off.
//!
//! # Example
//!
//! ```
//! use rangefetch_core::download::{
//!     DownloadError, RetryPolicy, RetryDecision, classify_error
//! };
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/file.iso", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::DownloadError;

/// Default maximum attempts per fetch (including the first).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (10 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Classification of download failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: 503 Service Unavailable, connection refused, read timeout.
    Transient,

    /// Server rate limiting (HTTP 429). Retried with backoff.
    RateLimited,

    /// The resource does not exist (HTTP 404). Never retried.
    NotFound,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: other HTTP error statuses, malformed responses, TLS failures.
    Permanent,
}

impl FailureType {
    /// Whether failures of this type may be retried at all.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }
}

/// Decision on whether to retry a failed request.
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

/// Configuration for retry behavior with capped exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 1 second
/// - `max_delay`: 10 seconds
/// - `max_jitter`: none
///
/// # Delay Calculation
///
/// ```text
/// delay after failed attempt n (0-indexed) = min(base_delay * 2^n, max_delay) + jitter
/// ```
///
/// With defaults, delays are 1s then 2s before the budget is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay after the first failed attempt.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Upper bound of random jitter added to each delay.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum attempts including initial (clamped to >= 1)
    /// * `base_delay` - Delay after the first failure
    /// * `max_delay` - Maximum delay cap
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            max_jitter: Duration::ZERO,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Adds up to `max_jitter` of random delay to every backoff.
    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry a failed request.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::NotFound => {
                return RetryDecision::DoNotRetry {
                    reason: "resource not found - retry would not help".to_string(),
                };
            }
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.calculate_delay(attempt),
            attempt: attempt + 1,
        }
    }

    /// Backoff after failed attempt `attempt` (1-indexed):
    /// `min(base_delay * 2^(attempt-1), max_delay) + jitter`.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        delay + self.calculate_jitter()
    }

    /// Generates random jitter between 0 and `max_jitter`.
    fn calculate_jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Classifies a download error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 404 | NotFound |
/// | HTTP 429 | RateLimited |
/// | HTTP 503 | Transient |
/// | other HTTP statuses | Permanent |
/// | read timeout | Transient |
/// | connect/body/protocol transport errors | Transient |
/// | TLS, builder and redirect-policy errors | Permanent |
/// | everything else | Permanent |
#[instrument(level = "trace")]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),

        DownloadError::ReadTimeout { .. } => FailureType::Transient,

        DownloadError::Network { source, .. } => {
            if is_tls_error(source) || source.is_builder() || source.is_redirect() {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }

        _ => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        404 => FailureType::NotFound,
        429 => FailureType::RateLimited,
        503 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = format!("{error:?}").to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

/// States of one fetch's attempt loop.
#[derive(Debug)]
enum AttemptState<T> {
    Attempting { attempt: u32 },
    Backoff { attempt: u32, delay: Duration },
    Exhausted { attempts: u32, last: DownloadError },
    Succeeded(T),
}

/// Runs `operation` under `policy` until it succeeds, fails permanently,
/// exhausts its attempt budget, or `cancel` fires.
///
/// `operation` receives the 1-indexed attempt number. Cancellation is observed
/// while an attempt is in flight and while backing off.
pub(crate) async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    url: &str,
    index: usize,
    mut operation: F,
) -> Result<T, DownloadError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    let mut state = AttemptState::Attempting { attempt: 1 };
    loop {
        state = match state {
            AttemptState::Attempting { attempt } => {
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
                    outcome = operation(attempt) => outcome,
                };
                match outcome {
                    Ok(value) => AttemptState::Succeeded(value),
                    Err(error) if error.is_abort() => return Err(error),
                    Err(error) => {
                        let failure_type = classify_error(&error);
                        match policy.should_retry(failure_type, attempt) {
                            RetryDecision::Retry { delay, .. } => {
                                warn!(
                                    index,
                                    attempt,
                                    max_attempts = policy.max_attempts(),
                                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                                    error = %error,
                                    "fetch failed, backing off"
                                );
                                AttemptState::Backoff { attempt, delay }
                            }
                            RetryDecision::DoNotRetry { .. } if failure_type.is_retryable() => {
                                AttemptState::Exhausted {
                                    attempts: attempt,
                                    last: error,
                                }
                            }
                            RetryDecision::DoNotRetry { reason } => {
                                debug!(index, attempt, %reason, "not retrying");
                                return Err(error);
                            }
                        }
                    }
                }
            }
            AttemptState::Backoff { attempt, delay } => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
                    () = tokio::time::sleep(delay) => AttemptState::Attempting { attempt: attempt + 1 },
                }
            }
            AttemptState::Exhausted { attempts, last } => {
                return Err(DownloadError::retries_exhausted(url, index, attempts, last));
            }
            AttemptState::Succeeded(value) => return Ok(value),
        };
    }
}
