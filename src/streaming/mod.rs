//! SSE (Server-Sent Events) line handling
//!
//! Upstream providers stream their output as SSE. Network chunks do not line up
//! with event boundaries, so bytes are reassembled into lines here before any
//! dialect-specific decoding happens.

use thiserror::Error;

/// Longest line accepted before a newline arrives
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// An upstream sent a line longer than [`MAX_LINE_BYTES`]
#[derive(Debug, Error, PartialEq, Eq)]
#[error("SSE line exceeds {limit} bytes without a newline")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Buffer for accumulating incomplete SSE lines across chunk boundaries.
///
/// # Example
/// ```
/// use worker_proxy::streaming::SseLineBuffer;
///
/// let mut buffer = SseLineBuffer::new();
///
/// let lines1 = buffer.feed(b"data: {\"content\":\"hel").unwrap();
/// assert!(lines1.is_empty());
///
/// let lines2 = buffer.feed(b"lo\"}\n").unwrap();
/// assert_eq!(lines2, vec!["data: {\"content\":\"hello\"}"]);
/// ```
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Bytes not yet terminated by `\n`
    incomplete: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the buffer and return any complete, non-empty lines.
    ///
    /// Trailing `\r` is stripped so CRLF streams behave like LF streams. Bytes are
    /// kept raw until a full line is available, which keeps multi-byte UTF-8
    /// sequences split across chunks intact.
    ///
    /// Fails once the unterminated tail grows past [`MAX_LINE_BYTES`]; the buffer is
    /// cleared when that happens.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, LineTooLong> {
        self.incomplete.extend_from_slice(bytes);

        let mut complete_lines = Vec::new();
        while let Some(newline_pos) = self.incomplete.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.incomplete.drain(..=newline_pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            // SSE uses blank lines as event separators
            if !line.is_empty() {
                complete_lines.push(String::from_utf8_lossy(&line).into_owned());
            }
        }

        if self.incomplete.len() > MAX_LINE_BYTES {
            self.incomplete = Vec::new();
            return Err(LineTooLong { limit: MAX_LINE_BYTES });
        }
        Ok(complete_lines)
    }

    /// Check if there's any incomplete data remaining in the buffer.
    pub fn has_incomplete(&self) -> bool {
        !self.incomplete.is_empty()
    }

    /// Take whatever is left once the stream has ended.
    ///
    /// Some upstreams omit the newline after their final event.
    pub fn take_remaining(&mut self) -> Option<String> {
        if self.incomplete.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.incomplete);
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim_end_matches('\r');
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Return the payload of a `data:` line, or `None` for comments and other fields.
///
/// The single optional space after the colon is removed, as SSE specifies.
pub fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
