//! Tunables for a [`DownloadEngine`](super::DownloadEngine).

use std::time::Duration;

use thiserror::Error;

use super::constants::{
    DEFAULT_CHUNK_READ_SIZE, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_WORKER_COUNT, OUTPUT_BUFFER,
};
use super::planner::RangeLimits;
use super::retry::RetryPolicy;

/// Smallest accepted `chunk_read_size` (1 KiB).
pub const MIN_CHUNK_READ_SIZE: usize = 1024;

/// Largest accepted `chunk_read_size` (16 MiB).
pub const MAX_CHUNK_READ_SIZE: usize = 16 * 1024 * 1024;

/// Largest accepted `worker_count`.
pub const MAX_WORKER_COUNT: usize = 64;

/// Largest accepted `max_concurrent_fetches`.
pub const MAX_CONCURRENT_FETCHES: usize = 256;

/// Error type for rejected [`DownloadOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    /// `chunk_read_size` outside the accepted range.
    #[error(
        "invalid chunk read size {value}: must be between {MIN_CHUNK_READ_SIZE} and {MAX_CHUNK_READ_SIZE} bytes"
    )]
    InvalidChunkReadSize {
        /// The rejected value.
        value: usize,
    },

    /// `worker_count` outside the accepted range.
    #[error("invalid worker count {value}: must be between 1 and {MAX_WORKER_COUNT}")]
    InvalidWorkerCount {
        /// The rejected value.
        value: usize,
    },

    /// `max_concurrent_fetches` outside the accepted range.
    #[error("invalid concurrency value {value}: must be between 1 and {MAX_CONCURRENT_FETCHES}")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// A zero timeout would expire before the first request.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// Range limits that cannot produce a plan.
    #[error("invalid range limits: min {min} must be > 0 and <= max {max}")]
    InvalidRangeLimits {
        /// Configured minimum range size.
        min: u64,
        /// Configured maximum range size.
        max: u64,
    },

    /// The output channel needs room for at least one buffer.
    #[error("output buffer must hold at least one chunk")]
    ZeroOutputBuffer,
}

/// Options applied to every download an engine performs.
///
/// # Default Values
///
/// | Option | Default |
/// |--------|---------|
/// | `chunk_read_size` | 64 KiB |
/// | `worker_count` | 4 |
/// | `max_concurrent_fetches` | 16 |
/// | `timeout` | none |
/// | `range_limits` | 1 MiB ..= 50 MiB |
/// | `retry_policy` | 3 attempts, 1s doubling to 10s |
/// | `output_buffer` | 8 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Largest buffer emitted in single-stream mode. Ranged downloads emit
    /// each range as one buffer and ignore it.
    pub chunk_read_size: usize,
    /// Number of ranges the planner aims for.
    pub worker_count: usize,
    /// Cap on range requests in flight for one download.
    pub max_concurrent_fetches: usize,
    /// Deadline for the whole download, probe included.
    pub timeout: Option<Duration>,
    /// Bounds on planned range sizes.
    pub range_limits: RangeLimits,
    /// Retry behavior for each fetch.
    pub retry_policy: RetryPolicy,
    /// Buffers the output channel holds before the download waits on the consumer.
    pub output_buffer: usize,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            chunk_read_size: DEFAULT_CHUNK_READ_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            timeout: None,
            range_limits: RangeLimits::default(),
            retry_policy: RetryPolicy::default(),
            output_buffer: OUTPUT_BUFFER,
        }
    }
}

impl DownloadOptions {
    /// Checks every option against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`OptionsError`] found.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(MIN_CHUNK_READ_SIZE..=MAX_CHUNK_READ_SIZE).contains(&self.chunk_read_size) {
            return Err(OptionsError::InvalidChunkReadSize {
                value: self.chunk_read_size,
            });
        }
        if !(1..=MAX_WORKER_COUNT).contains(&self.worker_count) {
            return Err(OptionsError::InvalidWorkerCount {
                value: self.worker_count,
            });
        }
        if !(1..=MAX_CONCURRENT_FETCHES).contains(&self.max_concurrent_fetches) {
            return Err(OptionsError::InvalidConcurrency {
                value: self.max_concurrent_fetches,
            });
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(OptionsError::ZeroTimeout);
        }
        let RangeLimits {
            min_range_bytes: min,
            max_range_bytes: max,
        } = self.range_limits;
        if min == 0 || min > max {
            return Err(OptionsError::InvalidRangeLimits { min, max });
        }
        if self.output_buffer == 0 {
            return Err(OptionsError::ZeroOutputBuffer);
        }
        Ok(())
    }
}
