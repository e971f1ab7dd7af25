//! Incremental parser for `text/event-stream` payloads.
//!
//! The realtime KV wire delivers one frame per change: an `event:` line
//! naming the change kind (`put`, `patch`, `keep-alive`, …) and a `data:`
//! line carrying JSON. Frames are separated by a blank line. Chunk
//! boundaries from the HTTP stream fall anywhere, so the parser buffers
//! until a complete frame is available.

/// One complete server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Stateful frame assembler fed with raw stream chunks.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and drain every frame it completes.
    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();
        while let Some((boundary, width)) = frame_boundary(&self.buffer) {
            let raw: String = self.buffer.drain(..boundary + width).collect();
            if let Some(frame) = parse_frame(&raw) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Locate the earliest blank line ending a frame, for either LF or CRLF
/// line endings. Returns the boundary offset and separator width.
fn frame_boundary(buffer: &str) -> Option<(usize, usize)> {
    let lf = buffer.find("\n\n").map(|at| (at, 2));
    let crlf = buffer.find("\r\n\r\n").map(|at| (at, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 < b.0 { a } else { b }),
        (found, None) | (None, found) => found,
    }
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data_lines = Vec::new();
    for line in raw.lines() {
        if line.starts_with(':') {
            // comment / heartbeat line
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start());
        }
    }
    event.map(|event| SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}
