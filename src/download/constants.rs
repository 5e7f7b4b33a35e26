//! Default values for the download module (timeouts, sizing, concurrency).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle time allowed between reads on one connection (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default largest buffer emitted by a single-stream download (64 KiB).
pub const DEFAULT_CHUNK_READ_SIZE: usize = 64 * 1024;

/// Default number of byte ranges a resource is split into.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default cap on simultaneously in-flight range requests.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

/// Smallest byte range the planner produces (1 MiB).
pub const MIN_RANGE_BYTES: u64 = 1024 * 1024;

/// Largest byte range the planner produces (50 MiB).
pub const MAX_RANGE_BYTES: u64 = 50 * 1024 * 1024;

/// Number of buffers the output channel holds before the producer waits on the consumer.
pub const OUTPUT_BUFFER: usize = 8;
