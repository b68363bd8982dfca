//! Incremental Server-Sent Events decoder.
//!
//! Turns bytes appended in arbitrary chunks into complete frames. A frame is
//! the group of lines up to a blank line; lines starting with `:` are
//! heartbeats and never reach the output.
//!
//! The buffer only ever grows at the back and shrinks at the front by whole
//! frames, so the output does not depend on how the input was chunked.

use bytes::{Bytes, BytesMut};

/// Event type of a frame with no `event:` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One decoded event-stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Value of the `event:` field.
    pub event_type: String,
    /// `data:` lines joined with `\n`.
    pub payload: Bytes,
    /// Value of the `id:` field.
    pub id: Option<String>,
}

impl Frame {
    /// Creates a frame.
    pub fn new(event_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: payload.into(),
            id: None,
        }
    }

    /// Returns the payload as text, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

enum Span {
    Frame(Frame),
    Heartbeat,
    Malformed(&'static str),
}

/// Resumable frame decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    // Start of the first line of the current frame not scanned yet.
    cursor: usize,
    frames_decoded: u64,
    heartbeats: u64,
    malformed_frames: u64,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes and returns every frame they complete, in order.
    ///
    /// An incomplete trailing frame stays buffered for the next call.
    pub fn append(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = self.find_frame_end() {
            let span = self.buffer.split_to(end).freeze();
            self.cursor = 0;

            match parse_span(&span) {
                Span::Frame(frame) => {
                    self.frames_decoded += 1;
                    frames.push(frame);
                }
                Span::Heartbeat => {
                    self.heartbeats += 1;
                    tracing::trace!(bytes = span.len(), "Heartbeat");
                }
                Span::Malformed(reason) => {
                    self.malformed_frames += 1;
                    tracing::warn!(bytes = span.len(), reason, "Dropping malformed frame");
                }
            }
        }

        frames
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of frames produced so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Number of heartbeat or comment-only spans consumed so far.
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    /// Number of frames dropped because they could not be lexed.
    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames
    }

    /// Consumes the decoder, returning the number of bytes of an unfinished
    /// trailing frame that were discarded.
    pub fn finish(self) -> usize {
        let discarded = self.buffer.len();
        if discarded > 0 {
            tracing::debug!(bytes = discarded, "Discarding incomplete trailing frame");
        }
        discarded
    }

    // Returns the offset just past the blank line ending the current frame.
    fn find_frame_end(&mut self) -> Option<usize> {
        loop {
            let rest = &self.buffer[self.cursor..];
            let newline = rest.iter().position(|&b| b == b'\n')?;
            let line = trim_cr(&rest[..newline]);
            let next = self.cursor + newline + 1;

            if line.is_empty() {
                return Some(next);
            }
            self.cursor = next;
        }
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_span(span: &Bytes) -> Span {
    let mut event_type: Option<&[u8]> = None;
    let mut id: Option<&[u8]> = None;
    let mut data: Vec<&[u8]> = Vec::new();

    for raw in span.split(|&b| b == b'\n') {
        let line = trim_cr(raw);
        if line.is_empty() || line[0] == b':' {
            continue;
        }

        let (field, value) = match line.iter().position(|&b| b == b':') {
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &[][..]),
        };

        match field {
            b"event" => event_type = Some(value),
            b"data" => data.push(value),
            b"id" => id = Some(value),
            // retry and unknown fields carry nothing for this client
            _ => {}
        }
    }

    if data.is_empty() {
        return Span::Heartbeat;
    }

    let event_type = match event_type {
        Some(raw) if !raw.is_empty() => match std::str::from_utf8(raw) {
            Ok(name) => name.to_string(),
            Err(_) => return Span::Malformed("event type is not valid UTF-8"),
        },
        _ => DEFAULT_EVENT_TYPE.to_string(),
    };

    let payload = match data.as_slice() {
        [single] => span.slice_ref(single),
        lines => Bytes::from(lines.join(&b'\n')),
    };

    Span::Frame(Frame {
        event_type,
        payload,
        id: id.and_then(|raw| std::str::from_utf8(raw).ok().map(str::to_string)),
    })
}
