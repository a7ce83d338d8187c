//! Server side of the progress stream.

use std::convert::Infallible;

use bytes::Bytes;
use futures::Stream;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::ProgressEvent;

/// Buffered lines between the producer and a slow HTTP client.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Progress channel is already closed")]
    Closed,
    #[error("Progress stream reader has gone away")]
    Disconnected,
}

struct Inner {
    tx: Option<mpsc::Sender<Bytes>>,
    reader_gone: bool,
}

/// Writer half of a progress stream.
///
/// Sends are serialized: the internal lock is held until the line has been
/// handed to the stream, so lines never interleave or reorder. Closing is
/// a one-way transition; afterwards every send and close is rejected.
pub struct ProgressChannel {
    inner: Mutex<Inner>,
}

/// Reader half, suitable as an HTTP response body.
pub struct ProgressStream {
    rx: mpsc::Receiver<Bytes>,
}

/// Create a connected writer/reader pair.
pub fn progress_channel() -> (ProgressChannel, ProgressStream) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        ProgressChannel {
            inner: Mutex::new(Inner {
                tx: Some(tx),
                reader_gone: false,
            }),
        },
        ProgressStream { rx },
    )
}

impl ProgressChannel {
    /// Append one status line.
    ///
    /// A disconnected reader is not fatal to the producer: the first
    /// failure is logged and reported, later sends are dropped quietly.
    pub async fn send(&self, status: impl Into<String>) -> Result<(), ProgressError> {
        let status = status.into();
        let mut inner = self.inner.lock().await;

        let Some(tx) = inner.tx.clone() else {
            warn!("Progress line after close dropped: {}", status);
            return Err(ProgressError::Closed);
        };

        if inner.reader_gone {
            return Err(ProgressError::Disconnected);
        }

        let line = Bytes::from(ProgressEvent::new(status).to_line());
        if tx.send(line).await.is_err() {
            debug!("Progress reader disconnected; work continues without a client");
            inner.reader_gone = true;
            return Err(ProgressError::Disconnected);
        }
        Ok(())
    }

    /// End the stream. Only the first call succeeds.
    pub async fn close(&self) -> Result<(), ProgressError> {
        let mut inner = self.inner.lock().await;
        match inner.tx.take() {
            Some(_) => Ok(()),
            None => Err(ProgressError::Closed),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.tx.is_none()
    }
}

impl ProgressStream {
    /// Raw NDJSON chunks, ending when the writer closes.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
        ReceiverStream::new(self.rx).map(Ok)
    }

    /// Next raw chunk, or `None` once the writer has closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Drain everything until close and decode it. Test and CLI helper.
    pub async fn collect_events(mut self) -> Vec<ProgressEvent> {
        let mut decoder = super::StatusLineDecoder::new();
        let mut events = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            events.extend(decoder.push(&chunk).into_iter().filter_map(Result::ok));
        }
        if let Some(Ok(last)) = decoder.finish() {
            events.push(last);
        }
        events
    }
}
