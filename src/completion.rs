//! One completion turn: request, stream, persist.

use std::io::Write;
use std::path::PathBuf;

use perplexity_api::{
    CancellationSignal, ChatCompletionRequest, FrameSource, Message, PerplexityApiError,
    PerplexityClient, DEFAULT_MODEL,
};
use thiserror::Error;
use thread_store::{Thread, ThreadStore, ThreadStoreError};

use crate::pacer::{PacedEmitter, PacerConfig};
use crate::stream::{drive_stream, StreamedReply};

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    /// Zero leaves the bound to the server.
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            max_tokens: 0,
        }
    }
}

impl CompletionOptions {
    pub fn request_for(&self, thread: &Thread) -> ChatCompletionRequest {
        ChatCompletionRequest::new(self.model.clone(), thread.messages.clone())
            .with_max_tokens(self.max_tokens)
    }
}

#[derive(Debug)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// The reply had no text, so the turn was not recorded.
    SkippedEmpty,
}

/// Result of a turn whose stream and persistence both succeeded.
#[derive(Debug)]
pub struct Completion {
    pub reply: StreamedReply,
    pub thread: Thread,
    pub saved: SaveOutcome,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Request(#[source] PerplexityApiError),

    #[error("read SSE: {0}")]
    Stream(#[source] PerplexityApiError),

    /// Streaming finished and was displayed; only saving failed.
    #[error("save thread: {source}")]
    Persist {
        reply: StreamedReply,
        thread: Thread,
        #[source]
        source: ThreadStoreError,
    },
}

impl CompletionError {
    /// The streamed reply, when streaming itself succeeded.
    pub fn streamed_reply(&self) -> Option<&StreamedReply> {
        match self {
            Self::Persist { reply, .. } => Some(reply),
            _ => None,
        }
    }
}

/// Continues the thread matching `continue_prefix`, or starts a new one.
pub fn prepare_thread(
    store: &dyn ThreadStore,
    continue_prefix: Option<&str>,
    query: &str,
) -> Result<Thread, ThreadStoreError> {
    match continue_prefix {
        Some(prefix) => {
            let mut thread = store.load(prefix)?;
            thread.push(Message::user(query));
            Ok(thread)
        }
        None => Ok(Thread::start(query)),
    }
}

/// Opens the stream for `thread` and runs the rest of the turn.
pub async fn complete<W>(
    client: &PerplexityClient,
    store: &dyn ThreadStore,
    thread: Thread,
    options: &CompletionOptions,
    sink: W,
    pacer: PacerConfig,
    cancel: &CancellationSignal,
) -> Result<Completion, CompletionError>
where
    W: Write + Send + 'static,
{
    let request = options.request_for(&thread);
    let mut frames = client
        .open_stream(&request, Some(cancel))
        .await
        .map_err(CompletionError::Request)?;

    run_completion(&mut frames, store, thread, sink, pacer, cancel).await
}

/// Streams the reply from `source` and records it on `thread`.
pub async fn run_completion<S, W>(
    source: &mut S,
    store: &dyn ThreadStore,
    thread: Thread,
    sink: W,
    pacer: PacerConfig,
    cancel: &CancellationSignal,
) -> Result<Completion, CompletionError>
where
    S: FrameSource + ?Sized,
    W: Write + Send + 'static,
{
    let emitter = PacedEmitter::spawn(sink, pacer, cancel.clone());
    let reply = drive_stream(source, emitter, cancel)
        .await
        .map_err(CompletionError::Stream)?;

    record_reply(store, thread, reply)
}

/// Appends a non-empty reply as an assistant message and saves the thread.
pub fn record_reply(
    store: &dyn ThreadStore,
    mut thread: Thread,
    reply: StreamedReply,
) -> Result<Completion, CompletionError> {
    if reply.text.is_empty() {
        tracing::debug!(thread_id = %thread.id, "empty reply; nothing to save");
        return Ok(Completion {
            reply,
            thread,
            saved: SaveOutcome::SkippedEmpty,
        });
    }

    thread.push(Message::assistant(reply.text.clone()));
    match store.save(&thread) {
        Ok(path) => Ok(Completion {
            reply,
            thread,
            saved: SaveOutcome::Saved(path),
        }),
        Err(source) => Err(CompletionError::Persist {
            reply,
            thread,
            source,
        }),
    }
}
