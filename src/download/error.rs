//! Error types for the download module.
//!
//! A single error enum covers probing, fetching, reassembly, verification and
//! the file sink, so callers can match on one type regardless of which stage
//! of a download failed.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while downloading a resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset, TLS, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// A single request timed out at the transport level.
    #[error("read timeout downloading {url}")]
    ReadTimeout {
        /// The URL whose request timed out.
        url: String,
    },

    /// HTTP error response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provided URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// A request header supplied with the target is not valid HTTP.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader {
        /// The header name as supplied.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The proxy descriptor could not be parsed.
    #[error("invalid proxy '{proxy}': {reason}")]
    InvalidProxy {
        /// The proxy string as supplied.
        proxy: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The server answered, but not in a way the downloader can use.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse {
        /// The URL that produced the response.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A range fetch failed on every attempt it was allowed.
    #[error("range {index} of {url} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// The URL being fetched.
        url: String,
        /// Index of the byte range (0 for single-stream downloads).
        index: usize,
        /// Number of attempts made.
        attempts: u32,
        /// The error observed on the final attempt.
        #[source]
        last: Box<DownloadError>,
    },

    /// The download was cancelled before it completed.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL whose download was cancelled.
        url: String,
    },

    /// The overall download deadline expired.
    #[error("download of {url} timed out after {}s", .after.as_secs_f64())]
    TimedOut {
        /// The URL whose download timed out.
        url: String,
        /// The configured overall timeout.
        after: Duration,
    },

    /// The digest of the delivered bytes did not match the expected digest.
    #[error("{algorithm} mismatch for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        /// The downloaded URL.
        url: String,
        /// Name of the digest algorithm.
        algorithm: &'static str,
        /// Expected hex digest, as supplied by the caller.
        expected: String,
        /// Actual lowercase hex digest of the delivered bytes.
        actual: String,
    },

    /// The requested digest algorithm is not supported.
    #[error("unsupported hash algorithm '{name}'")]
    UnsupportedAlgorithm {
        /// The algorithm name as supplied.
        name: String,
    },

    /// The expected digest string could not be parsed.
    #[error("invalid expected digest '{value}': {reason}")]
    InvalidDigest {
        /// The digest string as supplied.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// File system error in the file sink.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be built for a target.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// A fetch task panicked or was aborted outside of cancellation.
    #[error("fetch task for {url} failed: {message}")]
    Task {
        /// The URL being fetched.
        url: String,
        /// Description of the join failure.
        message: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, mapping transport timeouts
    /// to [`DownloadError::ReadTimeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::ReadTimeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a transport read timeout error.
    pub fn read_timeout(url: impl Into<String>) -> Self {
        Self::ReadTimeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid proxy error.
    pub fn invalid_proxy(proxy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProxy {
            proxy: proxy.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed response error.
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Wraps the last observed error once the attempt budget is spent.
    pub fn retries_exhausted(
        url: impl Into<String>,
        index: usize,
        attempts: u32,
        last: DownloadError,
    ) -> Self {
        Self::RetriesExhausted {
            url: url.into(),
            index,
            attempts,
            last: Box::new(last),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates an overall-deadline error.
    pub fn timed_out(url: impl Into<String>, after: Duration) -> Self {
        Self::TimedOut {
            url: url.into(),
            after,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a task failure error.
    pub fn task(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Task {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns true for cooperative aborts (cancellation or deadline expiry).
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::TimedOut { .. })
    }

    /// Returns the HTTP status carried by this error, looking through retry wrappers.
    #[must_use]
    pub fn http_status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.http_status_code(),
            _ => None,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// URL or path for context, which the source errors do not carry.
