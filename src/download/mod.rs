//! Parallel ranged HTTP downloads with ordered reassembly.
//!
//! This module turns one URL into an ordered stream of bytes. When the server
//! verifiably supports byte ranges, the resource is split into ranges that are
//! fetched concurrently and put back together in order before anything is
//! emitted; otherwise the body is streamed with a single request.
//!
//! # Features
//!
//! - Capability probing (length plus a real ranged request, not just headers)
//! - Bounded concurrency per download with per-range retry and backoff
//! - In-order output through a bounded channel (consumer backpressure)
//! - Cooperative cancellation and an overall deadline
//! - Optional streaming digest verification and atomic file output
//!
//! # Example
//!
//! ```no_run
//! use rangefetch_core::download::{
//!     DownloadEngine, DownloadOptions, DownloadTarget, ExpectedDigest, HttpClient,
//! };
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(HttpClient::new(), DownloadOptions::default())?;
//! let target = DownloadTarget::new("https://example.com/image.iso")?;
//! let expected = ExpectedDigest::parse("sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")?;
//!
//! let bytes = engine
//!     .download_to_file(&target, Path::new("image.iso"), Some(expected))
//!     .await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
mod fetcher;
mod options;
mod planner;
mod probe;
mod reorder;
mod retry;
mod session;
mod sink;
mod stream;
mod target;
mod verify;

pub use client::{ClientConfig, HttpClient};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CHUNK_READ_SIZE, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_WORKER_COUNT, MAX_RANGE_BYTES, MIN_RANGE_BYTES, READ_TIMEOUT_SECS,
};
pub use engine::DownloadEngine;
pub use error::DownloadError;
pub use fetcher::{Chunk, ChunkFetcher};
pub use options::{
    DownloadOptions, MAX_CHUNK_READ_SIZE, MAX_CONCURRENT_FETCHES, MAX_WORKER_COUNT,
    MIN_CHUNK_READ_SIZE, OptionsError,
};
pub use planner::{ByteRange, RangeLimits, plan_ranges};
pub use probe::{ContentProbe, probe};
pub use reorder::{ReorderBuffer, ReorderError};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use sink::save_stream;
pub use stream::DownloadStream;
pub use target::DownloadTarget;
pub use verify::{ExpectedDigest, HashAlgorithm, HashVerifier};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
