//! Incremental Server-Sent-Events frame decoder.
//!
//! The subscription body arrives as arbitrary byte chunks; this decoder
//! buffers them and yields complete frames (blank-line delimited). It is
//! a pure state machine so frame handling is testable without sockets.

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// Value of the `event:` field; empty if the frame had none.
    pub event: String,
    /// All `data:` lines of the frame, joined with newlines.
    pub data: String,
}

/// Buffers byte chunks and splits them into frames.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        SseDecoder::default()
    }

    /// Feed a chunk; returns every frame completed by it.
    ///
    /// Frames without any `data:` line (comments, keep-alives) are
    /// swallowed here.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        // CR stripping makes CRLF and LF framing uniform.
        self.buf.extend(chunk.iter().filter(|&&b| b != b'\r'));

        let mut messages = Vec::new();
        while let Some(pos) = find_frame_end(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..pos + 2).collect();
            let text = String::from_utf8_lossy(&frame[..pos]);
            if let Some(message) = parse_frame(&text) {
                messages.push(message);
            }
        }
        messages
    }
}

fn find_frame_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(frame: &str) -> Option<SseMessage> {
    let mut event = String::new();
    let mut data_lines = Vec::new();

    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = value.to_string(),
            "data" => data_lines.push(value.to_string()),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseMessage {
        event,
        data: data_lines.join("\n"),
    })
}
