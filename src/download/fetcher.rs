//! Fetching of individual byte ranges, and of the whole body when ranges are
//! unavailable.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::{Method, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use super::DownloadError;
use super::client::HttpClient;
use super::planner::ByteRange;
use super::retry::{RetryPolicy, run_with_retry};
use super::target::DownloadTarget;

/// The bytes of one planned range, tagged with the range's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Index of the range this payload belongs to.
    pub index: usize,
    /// The range's bytes, exactly `range.len()` of them.
    pub payload: Bytes,
}

/// Fetches ranges of one target under a shared retry policy and cancellation token.
///
/// Cloning is cheap; each fetch task gets its own clone.
#[derive(Debug, Clone)]
pub struct ChunkFetcher {
    client: HttpClient,
    target: Arc<DownloadTarget>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl ChunkFetcher {
    /// Creates a fetcher for `target`.
    #[must_use]
    pub fn new(
        client: HttpClient,
        target: Arc<DownloadTarget>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            target,
            policy,
            cancel,
        }
    }

    /// URL being fetched.
    #[must_use]
    pub fn url(&self) -> &str {
        self.target.url_str()
    }

    /// Fetches `range`, retrying transient failures per the policy.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::MalformedResponse`] if the server does not answer 206
    ///   with exactly `range.len()` bytes
    /// - [`DownloadError::HttpStatus`] for non-retryable statuses such as 404
    /// - [`DownloadError::RetriesExhausted`] once the attempt budget is spent
    /// - [`DownloadError::Cancelled`] if the token fires first
    #[instrument(skip(self), fields(index = range.index, start = range.start, end = range.end))]
    pub async fn fetch(&self, range: ByteRange) -> Result<Chunk, DownloadError> {
        let payload = run_with_retry(&self.policy, &self.cancel, self.url(), range.index, |attempt| {
            trace!(attempt, "requesting range");
            self.fetch_once(range)
        })
        .await?;
        debug!(bytes = payload.len(), "range complete");
        Ok(Chunk {
            index: range.index,
            payload,
        })
    }

    /// Opens an unranged GET, retrying until a successful response is obtained.
    ///
    /// Only opening the response is retried; once its body starts flowing to
    /// the consumer a failure is terminal.
    ///
    /// # Errors
    ///
    /// Same classes as [`ChunkFetcher::fetch`], minus the range checks.
    #[instrument(skip(self))]
    pub async fn open_stream(&self) -> Result<Response, DownloadError> {
        run_with_retry(&self.policy, &self.cancel, self.url(), 0, |attempt| {
            trace!(attempt, "requesting full body");
            self.client.send(Method::GET, &self.target, None)
        })
        .await
    }

    async fn fetch_once(&self, range: ByteRange) -> Result<Bytes, DownloadError> {
        let url = self.url();
        let response = self
            .client
            .send(Method::GET, &self.target, Some(&range.header_value()))
            .await?;

        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::malformed(
                url,
                format!(
                    "expected 206 for {}, got {}",
                    range.header_value(),
                    status.as_u16()
                ),
            ));
        }

        let expected = range.len();
        let mut buffer = BytesMut::with_capacity(usize::try_from(expected).unwrap_or(0));
        let mut body = response.bytes_stream();
        while let Some(frame) = body.next().await {
            if self.cancel.is_cancelled() {
                return Err(DownloadError::cancelled(url));
            }
            let frame = frame.map_err(|e| DownloadError::network(url, e))?;
            if buffer.len() as u64 + frame.len() as u64 > expected {
                return Err(DownloadError::malformed(
                    url,
                    format!("range {} returned more than {expected} bytes", range.index),
                ));
            }
            buffer.extend_from_slice(&frame);
        }

        if buffer.len() as u64 != expected {
            return Err(DownloadError::malformed(
                url,
                format!(
                    "range {} returned {} of {expected} bytes",
                    range.index,
                    buffer.len()
                ),
            ));
        }
        Ok(buffer.freeze())
    }
}
