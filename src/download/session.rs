//! Per-download orchestration: fans ranges out to fetch tasks and feeds the
//! reassembled bytes into the output channel.
//!
//! # Concurrency Model
//!
//! - Each range runs in its own Tokio task inside a `JoinSet`
//! - A semaphore permit is acquired before each fetch starts (RAII release)
//! - Completed chunks come back through the `JoinSet` to the single session
//!   task, which alone owns the [`ReorderBuffer`]
//! - The output channel is bounded, so a slow consumer pauses emission
//! - The first failure cancels every sibling and becomes the stream's last item

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::DownloadError;
use super::fetcher::{Chunk, ChunkFetcher};
use super::planner::ByteRange;
use super::reorder::ReorderBuffer;

/// How a session moves the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransferPlan {
    /// Fetch these ranges in parallel and reassemble them.
    Ranged(Vec<ByteRange>),
    /// One unranged GET, re-cut into buffers of at most `chunk_read_size`.
    SingleStream { chunk_read_size: usize },
}

/// Point in time at which the whole download gives up.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    pub(crate) at: Instant,
    pub(crate) after: Duration,
}

impl Deadline {
    pub(crate) fn starting_now(after: Duration) -> Self {
        Self {
            at: Instant::now() + after,
            after,
        }
    }
}

type Output = mpsc::Sender<Result<Bytes, DownloadError>>;

/// State owned by the task that runs one download.
#[derive(Debug)]
pub(crate) struct DownloadSession {
    url: String,
    cancel: CancellationToken,
    permits: Arc<Semaphore>,
    reorder: ReorderBuffer,
    output: Output,
}

impl DownloadSession {
    pub(crate) fn new(
        url: impl Into<String>,
        cancel: CancellationToken,
        max_concurrent_fetches: usize,
        output: Output,
    ) -> Self {
        Self {
            url: url.into(),
            cancel,
            permits: Arc::new(Semaphore::new(max_concurrent_fetches)),
            reorder: ReorderBuffer::new(),
            output,
        }
    }

    /// Runs the transfer to completion, delivering any failure as the final item.
    #[instrument(skip_all, fields(url = %self.url))]
    pub(crate) async fn run(
        mut self,
        fetcher: ChunkFetcher,
        plan: TransferPlan,
        deadline: Option<Deadline>,
    ) {
        let url = self.url.clone();
        let outcome = match deadline {
            Some(deadline) => {
                tokio::select! {
                    outcome = self.transfer(fetcher, plan) => outcome,
                    () = tokio::time::sleep_until(deadline.at) => {
                        Err(DownloadError::timed_out(&url, deadline.after))
                    }
                }
            }
            None => self.transfer(fetcher, plan).await,
        };

        match outcome {
            Ok(()) => info!("download complete"),
            Err(error) => {
                self.cancel.cancel();
                if error.is_abort() {
                    info!(error = %error, "download stopped");
                } else {
                    warn!(error = %error, "download failed");
                }
                if self.output.send(Err(error)).await.is_err() {
                    debug!("consumer went away before the final error");
                }
            }
        }
    }

    async fn transfer(
        &mut self,
        fetcher: ChunkFetcher,
        plan: TransferPlan,
    ) -> Result<(), DownloadError> {
        match plan {
            TransferPlan::Ranged(ranges) => self.transfer_ranges(fetcher, ranges).await,
            TransferPlan::SingleStream { chunk_read_size } => {
                self.transfer_single(fetcher, chunk_read_size).await
            }
        }
    }

    async fn transfer_ranges(
        &mut self,
        fetcher: ChunkFetcher,
        ranges: Vec<ByteRange>,
    ) -> Result<(), DownloadError> {
        let expected = ranges.len();
        info!(ranges = expected, "starting parallel transfer");

        let mut tasks = JoinSet::new();
        for range in ranges {
            let fetcher = fetcher.clone();
            let permits = Arc::clone(&self.permits);
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        return Err(DownloadError::cancelled(fetcher.url()));
                    }
                    permit = permits.acquire_owned() => permit
                        .map_err(|_| DownloadError::task(fetcher.url(), "fetch permits closed"))?,
                };
                fetcher.fetch(range).await
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(DownloadError::cancelled(&self.url)),
                () = self.output.closed() => return Err(DownloadError::cancelled(&self.url)),
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            let chunk: Chunk = match joined {
                Ok(Ok(chunk)) => chunk,
                Ok(Err(error)) => {
                    self.cancel.cancel();
                    tasks.shutdown().await;
                    return Err(error);
                }
                Err(join_error) => {
                    self.cancel.cancel();
                    tasks.shutdown().await;
                    return Err(DownloadError::task(&self.url, join_error.to_string()));
                }
            };

            let index = chunk.index;
            let ready = self
                .reorder
                .submit_and_drain(chunk)
                .map_err(|e| DownloadError::task(&self.url, e.to_string()))?;
            debug!(
                index,
                released = ready.len(),
                pending = self.reorder.pending_len(),
                "chunk received"
            );
            for payload in ready {
                self.emit(payload).await?;
            }
        }

        for payload in self.reorder.drain() {
            self.emit(payload).await?;
        }
        if !self.reorder.is_complete(expected) {
            return Err(DownloadError::malformed(
                &self.url,
                format!(
                    "reassembly stopped at range {} of {expected}",
                    self.reorder.next_expected()
                ),
            ));
        }
        Ok(())
    }

    async fn transfer_single(
        &mut self,
        fetcher: ChunkFetcher,
        chunk_read_size: usize,
    ) -> Result<(), DownloadError> {
        info!("starting single-stream transfer");
        let response = fetcher.open_stream().await?;
        let mut body = response.bytes_stream();

        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(DownloadError::cancelled(&self.url)),
                () = self.output.closed() => return Err(DownloadError::cancelled(&self.url)),
                frame = body.next() => frame,
            };
            let Some(frame) = frame else {
                break;
            };
            let mut frame = frame.map_err(|e| DownloadError::network(&self.url, e))?;
            while !frame.is_empty() {
                let piece = frame.split_to(frame.len().min(chunk_read_size));
                self.emit(piece).await?;
            }
        }
        Ok(())
    }

    /// Hands one buffer to the consumer, waiting for room in the channel.
    async fn emit(&self, payload: Bytes) -> Result<(), DownloadError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(DownloadError::cancelled(&self.url)),
            sent = self.output.send(Ok(payload)) => {
                sent.map_err(|_| DownloadError::cancelled(&self.url))
            }
        }
    }
}
