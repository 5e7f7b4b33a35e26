//! Rangefetch Core Library
//!
//! This library downloads a single HTTP(S) resource as fast as the server
//! allows: it probes for real byte-range support, fetches ranges concurrently
//! under a bounded worker pool, and hands the consumer one ordered stream of
//! bytes that is identical to a plain sequential download.
//!
//! # Architecture
//!
//! Everything lives in [`download`]:
//! - probing and range planning decide the strategy
//! - chunk fetchers retry transient failures with capped backoff
//! - a per-download session reassembles chunks in order and feeds a bounded channel
//! - [`download::HashVerifier`] and [`download::save_stream`] sit on the consumer side

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
mod user_agent;

// Re-export commonly used types
pub use download::{
    ContentProbe, DownloadEngine, DownloadError, DownloadOptions, DownloadStream, DownloadTarget,
    ExpectedDigest, HashAlgorithm, HttpClient, OptionsError, RetryPolicy,
};
