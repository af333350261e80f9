//! Incremental `text/event-stream` decoding.

use tracing::warn;

/// Longest line, and largest `data` payload per frame, the decoder holds.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// One dispatched event. `event` defaults to `message` when the server
/// sends no `event:` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    /// The `id:` field read as a sequence number, when it is one.
    pub fn sequence(&self) -> Option<u64> {
        self.id.as_deref().and_then(|id| id.parse().ok())
    }
}

/// Turns arbitrary byte chunks into frames.
///
/// Lines may end in LF or CRLF and may be split anywhere across chunks,
/// including inside a multi-byte character. Comment lines (keep-alives)
/// and unknown fields are skipped; `retry:` is ignored.
///
/// A line or frame larger than the limit is discarded whole, and decoding
/// resumes at the next line or frame boundary.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_bytes: usize,
    id: Option<String>,
    limit: usize,
    skip_line: bool,
    skip_frame: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
            data_bytes: 0,
            id: None,
            limit,
            skip_line: false,
            skip_frame: false,
        }
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<SseFrame> {
        if self.skip_line {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(end) => {
                    self.skip_line = false;
                    chunk = &chunk[end + 1..];
                }
                None => return Vec::new(),
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let mut line = &self.buffer[consumed..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            consumed = end + 1;

            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.limit {
            warn!(pending = self.buffer.len(), limit = self.limit, "event stream line too long; discarding");
            self.buffer.clear();
            self.reset_frame();
            self.skip_line = true;
            self.skip_frame = true;
        }
        frames
    }

    /// Bytes held back waiting for a line ending.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if self.skip_frame {
            return None;
        }
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_bytes += value.len();
                if self.data_bytes > self.limit {
                    warn!(limit = self.limit, "event stream frame too large; discarding");
                    self.reset_frame();
                    self.skip_frame = true;
                } else {
                    self.data.push(value.to_string());
                }
            }
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn reset_frame(&mut self) {
        self.event = None;
        self.data.clear();
        self.data_bytes = 0;
        self.id = None;
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if std::mem::take(&mut self.skip_frame) {
            self.reset_frame();
            return None;
        }
        let event = self.event.take();
        let id = self.id.take();
        self.data_bytes = 0;
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
            id,
        })
    }
}
