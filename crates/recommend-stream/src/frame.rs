//! Incremental frame parser for the line-framed recommendation stream.
//!
//! Each frame is one line of the form
//! `data: {"event":"delta"|"done"|"error","data":"<text>"}` terminated by
//! `\n`. Chunks can split lines (and multi-byte characters) anywhere, so the
//! parser buffers raw bytes and only decodes lines once their terminator has
//! arrived.

use tracing::trace;

/// Prefix that marks a line as carrying a frame.
pub const DATA_PREFIX: &str = "data: ";

/// Event kind carried by a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Incremental text fragment.
    Delta,
    /// Terminal success.
    Done,
    /// Terminal server-side failure.
    Error,
}

/// One complete protocol unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: String,
}

impl Frame {
    pub fn delta(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Delta,
            payload: payload.into(),
        }
    }

    pub fn done() -> Self {
        Self {
            kind: FrameKind::Done,
            payload: String::new(),
        }
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Error,
            payload: payload.into(),
        }
    }
}

#[derive(serde::Deserialize)]
struct WireEvent {
    event: FrameKind,
    #[serde(default)]
    data: String,
}

/// Longest unterminated line the parser buffers before giving up on it.
pub const DEFAULT_MAX_LINE_LEN: usize = 1 << 20;

/// Buffers arriving chunks and extracts complete frames.
///
/// The buffer never holds a complete line between calls to [`feed`](Self::feed).
/// A line that grows past the configured limit is discarded up to its
/// terminator and recorded in [`line_limit_exceeded`](Self::line_limit_exceeded).
#[derive(Debug)]
pub struct FrameParser {
    buf: Vec<u8>,
    // Prefix of `buf` already searched for a terminator.
    scanned: usize,
    max_line_len: usize,
    discarding: bool,
    line_limit_exceeded: bool,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line_len: max_line_len.max(1),
            discarding: false,
            line_limit_exceeded: false,
        }
    }

    /// Appends `chunk` and returns every frame completed by it, in order.
    ///
    /// Lines without [`DATA_PREFIX`] and data lines whose payload does not
    /// decode are dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let chunk = if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    &chunk[end + 1..]
                }
                None => return Vec::new(),
            }
        } else {
            chunk
        };
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut search_from = self.scanned;
        // `\n` never appears inside a multi-byte UTF-8 sequence, so splitting
        // on the raw byte is safe before decoding.
        while let Some(offset) = self.buf[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            if let Some(frame) = parse_line(&self.buf[consumed..end]) {
                frames.push(frame);
            }
            consumed = end + 1;
            search_from = consumed;
        }
        self.buf.drain(..consumed);
        self.scanned = self.buf.len();

        if self.buf.len() > self.max_line_len {
            trace!(limit = self.max_line_len, buffered = self.buf.len(), "discarding oversized line");
            self.buf.clear();
            self.scanned = 0;
            self.discarding = true;
            self.line_limit_exceeded = true;
        }
        frames
    }

    /// Number of bytes waiting for a line terminator.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    /// Whether any line so far grew past the limit and was discarded.
    pub fn line_limit_exceeded(&self) -> bool {
        self.line_limit_exceeded
    }

    /// Signals end of input. Any unterminated tail is discarded and its
    /// length returned.
    pub fn finish(&mut self) -> usize {
        let discarded = self.buf.len();
        self.buf.clear();
        self.scanned = 0;
        self.discarding = false;
        discarded
    }
}

fn parse_line(line: &[u8]) -> Option<Frame> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let Ok(text) = std::str::from_utf8(line) else {
        trace!(len = line.len(), "dropping non UTF-8 line");
        return None;
    };
    let payload = text.strip_prefix(DATA_PREFIX)?;
    match serde_json::from_str::<WireEvent>(payload) {
        Ok(event) => Some(Frame {
            kind: event.event,
            payload: event.data,
        }),
        Err(err) => {
            trace!(error = %err, "dropping undecodable data line");
            None
        }
    }
}
