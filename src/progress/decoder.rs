//! Client side of the progress stream.
//!
//! HTTP chunks do not line up with status lines: one chunk may carry
//! several lines, and a line (or a multi-byte character inside it) may be
//! split across chunks. The decoder buffers raw bytes and only decodes
//! complete lines.

use thiserror::Error;

use super::ProgressEvent;

#[derive(Debug, Error)]
#[error("Malformed progress line {line:?}: {source}")]
pub struct DecodeError {
    pub line: String,
    #[source]
    pub source: serde_json::Error,
}

/// Incremental NDJSON decoder for progress streams.
#[derive(Debug, Default)]
pub struct StatusLineDecoder {
    pending: Vec<u8>,
}

impl StatusLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every line completed by it.
    ///
    /// Blank lines are skipped. A malformed line yields an error entry but
    /// does not disturb the lines around it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<ProgressEvent, DecodeError>> {
        self.pending.extend_from_slice(chunk);

        let mut out = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(result) = decode_line(&self.pending[start..end]) {
                out.push(result);
            }
            start = end + 1;
        }
        self.pending.drain(..start);
        out
    }

    /// Bytes received after the last newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decode whatever is left once the stream has ended.
    pub fn finish(mut self) -> Option<Result<ProgressEvent, DecodeError>> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<Result<ProgressEvent, DecodeError>> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<ProgressEvent>(line).map_err(|source| DecodeError {
            line: line.to_string(),
            source,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(results: Vec<Result<ProgressEvent, DecodeError>>) -> Vec<String> {
        results.into_iter().map(|r| r.unwrap().status).collect()
    }

    #[test]
    fn test_several_lines_in_one_chunk() {
        let mut decoder = StatusLineDecoder::new();
        let got = decoder.push(b"{\"status\":\"a\"}\n{\"status\":\"b\"}\n");
        assert_eq!(statuses(got), vec!["a", "b"]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = StatusLineDecoder::new();
        assert!(decoder.push(b"{\"status\":\"Downl").is_empty());
        assert!(decoder.push(b"oading file...").is_empty());
        let got = decoder.push(b"\"}\n{\"status\":\"next");
        assert_eq!(statuses(got), vec!["Downloading file..."]);
        let got = decoder.push(b"\"}\n");
        assert_eq!(statuses(got), vec!["next"]);
    }

    #[test]
    fn test_multibyte_character_split() {
        let line = ProgressEvent::new("İndirme tamamlandı ✓").to_line();
        // Split inside the first multi-byte character.
        let (head, tail) = line.split_at(12);
        let mut decoder = StatusLineDecoder::new();
        assert!(decoder.push(head).is_empty());
        let got = decoder.push(tail);
        assert_eq!(statuses(got), vec!["İndirme tamamlandı ✓"]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut wire = ProgressEvent::new("one").to_line();
        wire.extend(ProgressEvent::new("two").to_line());

        let mut decoder = StatusLineDecoder::new();
        let mut got = Vec::new();
        for byte in &wire {
            got.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(statuses(got), vec!["one", "two"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = StatusLineDecoder::new();
        assert!(decoder.push(b"{\"status\":\"last\"}").is_empty());
        assert_eq!(decoder.finish().unwrap().unwrap().status, "last");
    }

    #[test]
    fn test_malformed_line_is_isolated() {
        let mut decoder = StatusLineDecoder::new();
        let got = decoder.push(b"{\"status\":\"ok\"}\nnot json\n\n{\"status\":\"ok2\"}\n");
        assert_eq!(got.len(), 3);
        assert!(got[0].is_ok());
        assert!(got[1].is_err());
        assert_eq!(got[2].as_ref().unwrap().status, "ok2");
    }
}
