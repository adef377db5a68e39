use std::fmt;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::error::PerplexityApiError;
use crate::events::{FrameOutcome, StructuredChunk, WireChunk};

/// Line marker that introduces an event payload.
pub const DATA_PREFIX: &[u8] = b"data:";
/// Completion sentinel sent by the server after the last record.
pub const DONE_SENTINEL: &[u8] = b"[DONE]";
/// Event fields other than `data` that carry nothing for the reassembler.
const CONTROL_FIELDS: [&[u8]; 3] = [b"event:", b"id:", b"retry:"];
/// Upper bound for one event frame and for one pending record.
pub const MAX_EVENT_BYTES: usize = 1 << 16;

/// Source of raw event frames from a long-lived response body.
#[async_trait]
pub trait FrameSource: Send {
    /// Returns the next frame, or `Ok(None)` once the transport has closed cleanly.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, PerplexityApiError>;
}

/// Rebuilds structured chunks from frames that may split one record across
/// several reads.
///
/// A payload that does not decode yet stays buffered and the next payload is
/// appended to it. The buffer is cleared after every successful decode.
#[derive(Debug, Default)]
pub struct ChunkReassembler {
    buffer: Vec<u8>,
}

impl ChunkReassembler {
    pub fn feed(&mut self, frame: &[u8]) -> Result<FrameOutcome, PerplexityApiError> {
        if frame.is_empty() {
            return Ok(FrameOutcome::Pending);
        }
        // Whitespace, comments and control fields only count as noise between
        // records; inside a partial record they are payload bytes.
        if self.buffer.is_empty() && (frame.trim_ascii().is_empty() || is_control_frame(frame)) {
            tracing::trace!("skipping SSE keep-alive frame");
            return Ok(FrameOutcome::Pending);
        }

        let payload = extract_payload(frame);
        if payload.trim_ascii() == DONE_SENTINEL {
            if !self.buffer.is_empty() {
                tracing::debug!(
                    pending_bytes = self.buffer.len(),
                    "discarding undecoded record at [DONE]"
                );
                self.buffer.clear();
            }
            return Ok(FrameOutcome::Done);
        }

        self.buffer.extend_from_slice(&payload);
        if self.buffer.len() > MAX_EVENT_BYTES {
            let pending = self.buffer.len();
            self.buffer.clear();
            return Err(PerplexityApiError::MalformedSse(format!(
                "record exceeds {MAX_EVENT_BYTES} bytes without decoding ({pending} pending)"
            )));
        }

        match serde_json::from_slice::<WireChunk>(&self.buffer) {
            Ok(wire) => {
                self.buffer.clear();
                Ok(FrameOutcome::Chunk(StructuredChunk::from(wire)))
            }
            Err(_) => Ok(FrameOutcome::Pending),
        }
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// A frame made only of comment lines and `event:`/`id:`/`retry:` fields.
fn is_control_frame(frame: &[u8]) -> bool {
    frame
        .split(|byte| *byte == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !line.is_empty())
        .all(|line| {
            line.starts_with(b":")
                || CONTROL_FIELDS
                    .iter()
                    .any(|field| line.starts_with(field))
        })
}

/// Payload of a frame: the values of its `data:` lines joined by `\n`, or the
/// whole frame when it carries no marker (pre-stripped or continuation reads).
fn extract_payload(frame: &[u8]) -> Vec<u8> {
    let data_lines: Vec<&[u8]> = frame
        .split(|byte| *byte == b'\n')
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(|value| {
            let value = value.strip_prefix(b" ").unwrap_or(value);
            value.strip_suffix(b"\r").unwrap_or(value)
        })
        .collect();

    if data_lines.is_empty() {
        frame.to_vec()
    } else {
        data_lines.join(&b'\n')
    }
}

/// Splits a byte stream into event frames on blank lines (`\n\n`, `\r\r` or
/// `\r\n\r\n`).
pub struct EventStreamReader<S> {
    stream: S,
    buffer: Vec<u8>,
    max_frame_bytes: usize,
    exhausted: bool,
}

impl<S> EventStreamReader<S> {
    pub fn new(stream: S) -> Self {
        Self::with_max_frame_bytes(stream, MAX_EVENT_BYTES)
    }

    pub fn with_max_frame_bytes(stream: S, max_frame_bytes: usize) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            max_frame_bytes,
            exhausted: false,
        }
    }

    fn take_frame(&mut self) -> Option<Vec<u8>> {
        let (end, delimiter_len) = find_frame_end(&self.buffer)?;
        let frame = self.buffer[..end].to_vec();
        self.buffer.drain(..end + delimiter_len);
        Some(frame)
    }
}

impl<S> fmt::Debug for EventStreamReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStreamReader")
            .field("buffered", &self.buffer.len())
            .field("max_frame_bytes", &self.max_frame_bytes)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[async_trait]
impl<S, B, E> FrameSource for EventStreamReader<S>
where
    S: Stream<Item = Result<B, E>> + Unpin + Send,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, PerplexityApiError> {
        loop {
            if let Some(frame) = self.take_frame() {
                return Ok(Some(frame));
            }
            if self.buffer.len() > self.max_frame_bytes {
                return Err(PerplexityApiError::MalformedSse(format!(
                    "event exceeds {} bytes",
                    self.max_frame_bytes
                )));
            }
            if self.exhausted {
                if self.buffer.trim_ascii().is_empty() {
                    self.buffer.clear();
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.buffer)));
            }

            match self.stream.next().await {
                Some(Ok(bytes)) => self.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(error)) => {
                    return Err(PerplexityApiError::Transport(error.to_string()));
                }
                None => self.exhausted = true,
            }
        }
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|index| {
        let rest = &buffer[index..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((index, 4))
        } else if rest.starts_with(b"\n\n") || rest.starts_with(b"\r\r") {
            Some((index, 2))
        } else {
            None
        }
    })
}
