//! Terminal client for streaming Perplexity chat completions.
//!
//! Invariant: one streaming call owns exactly one pacing task, and the call
//! never returns before that task has been joined.
//!
//! # Overview
//! - [`stream::drive_stream`] reads event frames, reassembles chunks and feeds
//!   text to a [`PacedEmitter`].
//! - [`completion`] wraps a stream into a full turn and persists it through a
//!   [`thread_store::ThreadStore`].
//! - [`display`] renders stored threads and citations.

pub mod cli;
pub mod completion;
pub mod config;
pub mod display;
pub mod logging;
pub mod pacer;
pub mod stream;

pub use completion::{
    complete, prepare_thread, record_reply, run_completion, Completion, CompletionError,
    CompletionOptions, SaveOutcome,
};
pub use config::EnvConfig;
pub use pacer::{PacedEmitter, PacerConfig, PacerReport};
pub use stream::{drive_stream, StreamedReply};
