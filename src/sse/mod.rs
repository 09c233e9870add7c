//! Incremental decoder for Server-Sent-Event streams.
//!
//! Chat completions arrive as `event:`/`data:` line frames separated by blank
//! lines, with JSON payloads. The decoder is single-pass and stateful for the
//! lifetime of one stream; decoding a new stream requires a new instance.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;

/// One decoded frame: the event name (`"message"` when the stream does not
/// name one) and the JSON-parsed `data:` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: String,
    pub data: Value,
}

type DroppedFrameHook = Box<dyn FnMut(&str) + Send>;

pub struct SseDecoder {
    // Append-only byte buffer, trimmed from the front as frames complete.
    // Bytes (not chars) so a UTF-8 code point split across chunks survives.
    buffer: Vec<u8>,
    on_dropped: Option<DroppedFrameHook>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            on_dropped: None,
        }
    }

    /// Observe frames whose `data:` payload failed to JSON-parse. Dropping
    /// such frames silently is deliberate best-effort streaming policy; the
    /// hook exists for diagnostics, not control flow.
    pub fn with_dropped_frame_hook(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_dropped = Some(Box::new(hook));
        self
    }

    /// Append a chunk and decode every complete frame it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(frame) = self.parse_frame(&raw[..pos]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing frame that arrived without a final blank-line
    /// delimiter. Call exactly once, when the stream reports completion.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        self.parse_frame(&raw)
    }

    fn parse_frame(&mut self, raw: &[u8]) -> Option<SseFrame> {
        let text = String::from_utf8_lossy(raw);

        let mut event = String::from("message");
        let mut data = String::new();
        for line in text.split('\n') {
            if let Some(rest) = line.strip_prefix("event:") {
                event = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                // Multi-line data concatenates without a separator
                data.push_str(rest.trim());
            }
        }

        if data.is_empty() {
            return None;
        }

        match serde_json::from_str(&data) {
            Ok(value) => Some(SseFrame { event, data: value }),
            Err(e) => {
                tracing::debug!("dropping SSE frame with undecodable data: {}", e);
                if let Some(hook) = self.on_dropped.as_mut() {
                    hook(&data);
                }
                None
            }
        }
    }

    /// Drive the decoder over a byte stream, invoking `on_frame` per decoded
    /// frame in byte order. A stream error (including an aborted fetch) stops
    /// the loop immediately; buffered partial data is discarded, not flushed.
    pub async fn consume<S, E, F>(mut self, stream: S, mut on_frame: F) -> Result<(), E>
    where
        S: Stream<Item = Result<Bytes, E>>,
        F: FnMut(SseFrame),
    {
        futures::pin_mut!(stream);

        while let Some(chunk) = stream.next().await {
            for frame in self.push(&chunk?) {
                on_frame(frame);
            }
        }
        if let Some(frame) = self.finish() {
            on_frame(frame);
        }
        Ok(())
    }
}
