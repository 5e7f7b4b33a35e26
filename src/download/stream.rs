//! The consumer side of a download: an ordered, finite stream of buffers.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DownloadError;
use super::probe::ContentProbe;

/// Ordered bytes of one download.
///
/// Yields `Ok` buffers in resource order. A failure is delivered as a final
/// `Err` item, after which the stream ends. Dropping the stream cancels the
/// download.
///
/// Once cancelled, buffers still queued in the channel are discarded: the
/// next item is the terminal error and no further bytes are yielded.
#[derive(Debug)]
pub struct DownloadStream {
    url: String,
    receiver: mpsc::Receiver<Result<Bytes, DownloadError>>,
    cancel: CancellationToken,
    probe: ContentProbe,
    finished: bool,
}

impl DownloadStream {
    pub(crate) fn new(
        url: impl Into<String>,
        receiver: mpsc::Receiver<Result<Bytes, DownloadError>>,
        cancel: CancellationToken,
        probe: ContentProbe,
    ) -> Self {
        Self {
            url: url.into(),
            receiver,
            cancel,
            probe,
            finished: false,
        }
    }

    /// Requests cancellation; the next item is [`DownloadError::Cancelled`]
    /// and no buffer queued before the call is yielded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that cancels this download from elsewhere, e.g. a signal handler.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// What the server reported when the download started.
    #[must_use]
    pub fn probe(&self) -> ContentProbe {
        self.probe
    }

    /// Total bytes the stream should yield, when known.
    #[must_use]
    pub fn expected_size(&self) -> Option<u64> {
        self.probe.total_size()
    }
}

impl Stream for DownloadStream {
    type Item = Result<Bytes, DownloadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if self.cancel.is_cancelled() {
            self.finished = true;
            return Poll::Ready(Some(Err(self.discard_queued())));
        }

        let item = ready!(self.receiver.poll_recv(cx));
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        Poll::Ready(item)
    }
}

impl DownloadStream {
    /// Closes the channel and drops queued buffers, keeping a queued error if
    /// the session already reported one.
    fn discard_queued(&mut self) -> DownloadError {
        self.receiver.close();
        let mut discarded = 0usize;
        while let Ok(item) = self.receiver.try_recv() {
            match item {
                Ok(bytes) => discarded += bytes.len(),
                Err(error) => {
                    debug!(discarded, "dropped queued bytes after cancellation");
                    return error;
                }
            }
        }
        debug!(discarded, "dropped queued bytes after cancellation");
        DownloadError::cancelled(&self.url)
    }
}

impl Drop for DownloadStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
