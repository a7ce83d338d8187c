//! Progress streaming from long-running downloads to HTTP clients.
//!
//! The wire format is newline-delimited JSON, one `{"status": "..."}`
//! object per line. The server side writes through [`ProgressChannel`];
//! clients reassemble lines with [`StatusLineDecoder`].

mod channel;
mod decoder;
mod sink;

use serde::{Deserialize, Serialize};

pub use channel::{progress_channel, ProgressChannel, ProgressError, ProgressStream};
pub use decoder::{DecodeError, StatusLineDecoder};
pub use sink::{DomainProgress, LogProgress, ProgressSink, RecordingProgress};

/// Content type of progress stream responses.
pub const PROGRESS_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// One line of the progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: String,
}

impl ProgressEvent {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }

    /// Encode as one NDJSON line, including the trailing newline.
    pub fn to_line(&self) -> Vec<u8> {
        // Serializing a struct with a single string field cannot fail.
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        line
    }
}
