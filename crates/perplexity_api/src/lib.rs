//! Transport primitives for the Perplexity chat completions API.
//!
//! This crate owns request building, the blank-line framing of the server-sent
//! event body, and reassembly of fragmented `data:` records into
//! [`StructuredChunk`]s. It contains no display or persistence code.
//!
//! Nothing here retries: every request or transport failure is returned to the
//! caller as-is.

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use cancel::{await_or_cancel, is_cancelled, CancellationSignal};
pub use client::{PerplexityClient, ResponseFrames};
pub use config::PerplexityApiConfig;
pub use error::PerplexityApiError;
pub use events::{FrameOutcome, StructuredChunk};
pub use payload::{ChatCompletionRequest, Message, Role, DEFAULT_MODEL};
pub use sse::{ChunkReassembler, EventStreamReader, FrameSource};
pub use url::normalize_completions_url;
