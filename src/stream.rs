//! Read loop of one streaming call.

use perplexity_api::{
    await_or_cancel, is_cancelled, CancellationSignal, ChunkReassembler, FrameOutcome,
    FrameSource, PerplexityApiError, StructuredChunk,
};

use crate::pacer::PacedEmitter;

/// Everything accumulated over one streaming call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamedReply {
    pub text: String,
    /// Last non-empty citation list seen; later lists replace earlier ones.
    pub citations: Vec<String>,
    pub finish_reason: Option<String>,
}

impl StreamedReply {
    /// Applies one chunk and returns the text to forward to the display.
    fn apply(&mut self, chunk: StructuredChunk) -> Option<String> {
        if !chunk.citations.is_empty() {
            self.citations = chunk.citations;
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
        let delta = chunk.delta?;
        self.text.push_str(&delta);
        Some(delta)
    }
}

/// Pulls frames from `source` until the stream ends, forwarding text to
/// `emitter`.
///
/// The stream ends on transport EOF, the `[DONE]` sentinel, or a chunk that
/// carries a finish reason. The emitter is joined on every exit path before
/// this returns, so no output is written after it. Cancellation while queued
/// text is still being displayed is reported as [`PerplexityApiError::Cancelled`].
pub async fn drive_stream<S>(
    source: &mut S,
    emitter: PacedEmitter,
    cancel: &CancellationSignal,
) -> Result<StreamedReply, PerplexityApiError>
where
    S: FrameSource + ?Sized,
{
    let read = read_frames(source, &emitter, cancel).await;
    let joined = emitter.finish().await;

    let reply = read?;
    let report = joined?;
    if report.cancelled || is_cancelled(Some(cancel)) {
        tracing::debug!(discarded = report.discarded, "cancelled while draining output");
        return Err(PerplexityApiError::Cancelled);
    }
    Ok(reply)
}

async fn read_frames<S>(
    source: &mut S,
    emitter: &PacedEmitter,
    cancel: &CancellationSignal,
) -> Result<StreamedReply, PerplexityApiError>
where
    S: FrameSource + ?Sized,
{
    let mut reassembler = ChunkReassembler::default();
    let mut reply = StreamedReply::default();

    loop {
        let Some(frame) = await_or_cancel(source.next_frame(), Some(cancel)).await?? else {
            tracing::debug!("received EOF from server");
            break;
        };
        if !frame.is_empty() {
            tracing::trace!(raw = %String::from_utf8_lossy(&frame), "raw SSE frame");
        }

        match reassembler.feed(&frame)? {
            FrameOutcome::Pending => {}
            FrameOutcome::Done => {
                tracing::debug!("got [DONE] sentinel");
                break;
            }
            FrameOutcome::Chunk(chunk) => {
                if let Some(delta) = reply.apply(chunk) {
                    emitter.emit(&delta).await?;
                }
                if let Some(reason) = reply.finish_reason.as_deref() {
                    tracing::debug!(reason, "completion finished");
                    break;
                }
            }
        }
    }

    if !reassembler.is_empty_buffer() {
        tracing::debug!(
            pending_bytes = reassembler.pending_bytes(),
            "stream ended with an undecoded partial record"
        );
    }
    Ok(reply)
}
