use serde::Deserialize;

/// One decoded logical record of the completion stream.
///
/// Citations are a full replacement list, not an increment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredChunk {
    pub delta: Option<String>,
    pub citations: Vec<String>,
    pub finish_reason: Option<String>,
}

/// Outcome of feeding one raw frame to the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing decodable yet (empty frame, noise, or a partial record).
    Pending,
    /// A complete record was decoded.
    Chunk(StructuredChunk),
    /// The `[DONE]` sentinel was seen.
    Done,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireChunk {
    #[serde(default)]
    pub choices: Vec<WireChoice>,
    #[serde(default)]
    pub citations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireChoice {
    #[serde(default)]
    pub delta: Option<WireDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl From<WireChunk> for StructuredChunk {
    fn from(wire: WireChunk) -> Self {
        let first = wire.choices.into_iter().next();
        let (delta, finish_reason) = match first {
            Some(choice) => (
                choice
                    .delta
                    .and_then(|delta| delta.content)
                    .filter(|content| !content.is_empty()),
                choice
                    .finish_reason
                    .filter(|reason| !reason.trim().is_empty()),
            ),
            None => (None, None),
        };

        Self {
            delta,
            citations: wire.citations.unwrap_or_default(),
            finish_reason,
        }
    }
}
