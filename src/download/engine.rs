//! Download engine: probes a target, picks a transfer strategy and runs it.
//!
//! # Overview
//!
//! [`DownloadEngine::download`] probes the target first. If the server
//! verifiably honours byte ranges and the resource is large enough to split,
//! the resource is planned into ranges that are fetched concurrently (bounded
//! by `max_concurrent_fetches`) and reassembled in order. Otherwise a single
//! GET streams the body. Either way the caller gets a [`DownloadStream`].
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use rangefetch_core::download::{DownloadEngine, DownloadOptions, DownloadTarget, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(HttpClient::new(), DownloadOptions::default())?;
//! let target = DownloadTarget::new("https://example.com/archive.tar")?;
//!
//! let mut stream = engine.download(&target).await?;
//! while let Some(bytes) = stream.next().await {
//!     let bytes = bytes?;
//!     println!("received {} bytes", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::fetcher::ChunkFetcher;
use super::options::{DownloadOptions, OptionsError};
use super::planner::plan_ranges;
use super::probe::{ContentProbe, probe};
use super::session::{Deadline, DownloadSession, TransferPlan};
use super::sink::save_stream;
use super::stream::DownloadStream;
use super::target::DownloadTarget;
use super::verify::{ExpectedDigest, HashVerifier};
use super::{DownloadError, HttpClient};

/// Entry point for downloads; holds the shared client and the options.
///
/// One engine can run any number of downloads, sequentially or at once. Each
/// download gets its own cancellation token, fetch permits and reorder buffer.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: HttpClient,
    options: DownloadOptions,
}

impl DownloadEngine {
    /// Creates an engine after validating `options`.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] if any option is outside its accepted range.
    ///
    /// # Example
    ///
    /// ```
    /// use rangefetch_core::download::{DownloadEngine, DownloadOptions, HttpClient};
    ///
    /// let options = DownloadOptions { worker_count: 8, ..DownloadOptions::default() };
    /// let engine = DownloadEngine::new(HttpClient::new(), options).unwrap();
    /// assert_eq!(engine.options().worker_count, 8);
    ///
    /// let invalid = DownloadOptions { worker_count: 0, ..DownloadOptions::default() };
    /// assert!(DownloadEngine::new(HttpClient::new(), invalid).is_err());
    /// ```
    pub fn new(client: HttpClient, options: DownloadOptions) -> Result<Self, OptionsError> {
        options.validate()?;
        Ok(Self { client, options })
    }

    /// Returns the options this engine was built with.
    #[must_use]
    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Reports the target's length and verified range support.
    ///
    /// # Errors
    ///
    /// Same as [`probe`](fn@crate::download::probe).
    pub async fn probe(&self, target: &DownloadTarget) -> Result<ContentProbe, DownloadError> {
        let client = self.client.for_target(target)?;
        probe(&client, target).await
    }

    /// Looks up the target's `Content-Type`; `None` on any failure.
    pub async fn content_type(&self, target: &DownloadTarget) -> Option<String> {
        match self.client.for_target(target) {
            Ok(client) => client.content_type(target).await,
            Err(error) => {
                tracing::warn!(error = %error, "failed to build client for content type");
                None
            }
        }
    }

    /// Starts downloading `target` and returns its ordered byte stream.
    ///
    /// The probe runs before this returns; transfer failures arrive as the
    /// stream's final item. With a `timeout` configured, the deadline starts
    /// now and covers both the probe and the transfer.
    ///
    /// # Errors
    ///
    /// Returns the probe's error, [`DownloadError::TimedOut`] if the deadline
    /// passes during the probe, or a client error for an unusable proxy.
    #[instrument(skip(self, target), fields(url = %target.url()))]
    pub async fn download(&self, target: &DownloadTarget) -> Result<DownloadStream, DownloadError> {
        let deadline = self.options.timeout.map(Deadline::starting_now);
        let client = self.client.for_target(target)?;

        let probe = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline.at, probe(&client, target))
                .await
                .map_err(|_| DownloadError::timed_out(target.url_str(), deadline.after))??,
            None => probe(&client, target).await?,
        };

        let plan = self.plan_transfer(&probe);
        match &plan {
            TransferPlan::Ranged(ranges) => info!(
                total_size = probe.total_size(),
                ranges = ranges.len(),
                "using parallel ranged transfer"
            ),
            TransferPlan::SingleStream { .. } => info!(
                total_size = probe.total_size(),
                supports_ranges = probe.supports_ranges(),
                "using single-stream transfer"
            ),
        }

        // The consumer holds the parent token. The session stops its fetches
        // through a child, which leaves the parent untouched on internal failures.
        let cancel = CancellationToken::new();
        let session_cancel = cancel.child_token();
        let (sender, receiver) = mpsc::channel(self.options.output_buffer);
        let target = Arc::new(target.clone());
        let fetcher = ChunkFetcher::new(
            client,
            Arc::clone(&target),
            self.options.retry_policy.clone(),
            session_cancel.clone(),
        );
        let session = DownloadSession::new(
            target.url_str(),
            session_cancel,
            self.options.max_concurrent_fetches,
            sender,
        );
        tokio::spawn(session.run(fetcher, plan, deadline));

        Ok(DownloadStream::new(target.url_str(), receiver, cancel, probe))
    }

    /// Like [`download`](Self::download), with the bytes checked against `expected`.
    ///
    /// # Errors
    ///
    /// Same as [`download`](Self::download); a mismatch arrives as the
    /// stream's final [`DownloadError::HashMismatch`] item.
    pub async fn download_verified(
        &self,
        target: &DownloadTarget,
        expected: ExpectedDigest,
    ) -> Result<HashVerifier<DownloadStream>, DownloadError> {
        let stream = self.download(target).await?;
        Ok(HashVerifier::new(stream, target.url_str(), expected))
    }

    /// Downloads `target` into `path`, optionally verifying it first.
    ///
    /// `path` is only replaced once the whole resource has arrived and
    /// matched `expected`. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Any download, verification or file-system error.
    pub async fn download_to_file(
        &self,
        target: &DownloadTarget,
        path: &Path,
        expected: Option<ExpectedDigest>,
    ) -> Result<u64, DownloadError> {
        match expected {
            Some(expected) => {
                let stream = self.download_verified(target, expected).await?;
                save_stream(stream, path).await
            }
            None => save_stream(self.download(target).await?, path).await,
        }
    }

    fn plan_transfer(&self, probe: &ContentProbe) -> TransferPlan {
        if let Some(total_size) = probe.total_size()
            && probe.supports_ranges()
            && self.options.worker_count > 1
        {
            let ranges = plan_ranges(
                total_size,
                self.options.worker_count,
                self.options.range_limits,
            );
            if ranges.len() > 1 {
                return TransferPlan::Ranged(ranges);
            }
        }
        TransferPlan::SingleStream {
            chunk_read_size: self.options.chunk_read_size,
        }
    }
}
