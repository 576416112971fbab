//! SSE (Server-Sent Events) stream decoding
//!
//! All upstream providers speak SSE when streaming; this decoder buffers
//! partial network chunks and yields complete `data:` frames.

use serde::de::DeserializeOwned;

/// Incremental SSE decoder.
///
/// Feed it raw byte chunks as they arrive; it returns the complete frames
/// contained so far and buffers the remainder. The buffer is bounded so a
/// malformed upstream cannot grow it without limit.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    /// Upper bound on buffered bytes between frames (1 MiB).
    const MAX_BUFFER_SIZE: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes and extract complete SSE frames.
    ///
    /// Incomplete trailing data stays buffered for the next push. Comment
    /// lines (`:` prefix) and field lines other than `data:` are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        if self.buffer.len() > Self::MAX_BUFFER_SIZE {
            tracing::warn!(
                "SSE buffer exceeded {}KB, truncating",
                Self::MAX_BUFFER_SIZE / 1024
            );
            let mut keep_from = self.buffer.len() - (Self::MAX_BUFFER_SIZE / 2);
            // The offset may land inside a multibyte character.
            while !self.buffer.is_char_boundary(keep_from) {
                keep_from += 1;
            }
            self.buffer = self.buffer[keep_from..].to_string();
        }

        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim_end_matches('\r').trim().to_string();
            self.buffer = self.buffer[pos + 1..].to_string();

            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                frames.push(SseFrame {
                    data: data.strip_prefix(' ').unwrap_or(data).to_string(),
                });
            }
        }

        frames
    }

    /// Push a string directly (tests and pre-decoded content).
    pub fn push_str(&mut self, s: &str) -> Vec<SseFrame> {
        self.push(s.as_bytes())
    }

    /// True when a partial line is still buffered.
    pub fn has_remaining(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// One complete `data:` frame.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub data: String,
}

impl SseFrame {
    /// The `[DONE]` end-of-stream sentinel used by OpenAI-style APIs.
    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }

    /// Parse the frame payload as JSON, returning None on failure.
    pub fn try_parse<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(&self.data).ok()
    }
}
