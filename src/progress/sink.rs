//! Progress callbacks handed to report fetchers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::ProgressChannel;

/// Receiver of human-readable progress messages.
///
/// Emitting never fails from the caller's point of view; sinks swallow
/// their own delivery problems.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, message: String);
}

#[async_trait]
impl ProgressSink for ProgressChannel {
    async fn emit(&self, message: String) {
        if let Err(e) = self.send(message).await {
            debug!("Progress line not delivered: {}", e);
        }
    }
}

#[async_trait]
impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    async fn emit(&self, message: String) {
        (**self).emit(message).await
    }
}

/// Prefixes every message with the job's domain before forwarding, so
/// interleaved lines from concurrent jobs stay attributable.
pub struct DomainProgress<S: ?Sized> {
    domain: String,
    inner: Arc<S>,
}

impl<S: ProgressSink + ?Sized> DomainProgress<S> {
    pub fn new(domain: impl Into<String>, inner: Arc<S>) -> Self {
        Self {
            domain: domain.into(),
            inner,
        }
    }
}

#[async_trait]
impl<S: ProgressSink + ?Sized> ProgressSink for DomainProgress<S> {
    async fn emit(&self, message: String) {
        self.inner
            .emit(format!("{}: {}", self.domain, message))
            .await
    }
}

/// Writes progress to the log. Used by local CLI runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

#[async_trait]
impl ProgressSink for LogProgress {
    async fn emit(&self, message: String) {
        info!("{}", message);
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingProgress {
    async fn emit(&self, message: String) {
        self.messages.lock().await.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_domain_prefix() {
        let recorder = Arc::new(RecordingProgress::new());
        let sink = DomainProgress::new("example.com", recorder.clone());
        sink.emit("Logging in...".to_string()).await;
        assert_eq!(recorder.messages().await, vec!["example.com: Logging in..."]);
    }

    #[tokio::test]
    async fn test_channel_sink_ignores_closed_channel() {
        let (channel, _stream) = crate::progress::progress_channel();
        channel.close().await.unwrap();
        // Must not panic or error.
        channel.emit("after close".to_string()).await;
    }

    #[tokio::test]
    async fn test_channel_sink_survives_disconnected_reader() {
        let (channel, stream) = crate::progress::progress_channel();
        drop(stream);
        channel.emit("nobody listening".to_string()).await;
        channel.emit("still nobody".to_string()).await;
        assert!(channel.close().await.is_ok());
    }
}
