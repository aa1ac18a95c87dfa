//! Error types for the podcast pipeline.

use thiserror::Error;

use crate::backend::EngineKind;
use crate::script::SegmentKind;

#[derive(Error, Debug)]
pub enum PodcastError {
    #[error("Parse error: {0}")]
    Parse(String),

    /// A single engine failed for a single attempt. Recovered by the fallback chain.
    #[error("{engine} synthesis failed: {message}")]
    Backend { engine: EngineKind, message: String },

    /// Every engine in a segment's chain failed, including the mock fallback.
    #[error(
        "Synthesis failed for segment {order} ({kind}) after trying [{}]: {cause}",
        format_engines(.attempted)
    )]
    Synthesis {
        order: usize,
        kind: SegmentKind,
        attempted: Vec<EngineKind>,
        cause: String,
    },

    #[error("Audio processing error: {0}")]
    Audio(String),

    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("Script generation failed: {0}")]
    ScriptGeneration(String),
}

impl PodcastError {
    pub(crate) fn backend(engine: EngineKind, message: impl Into<String>) -> Self {
        PodcastError::Backend {
            engine,
            message: message.into(),
        }
    }
}

fn format_engines(engines: &[EngineKind]) -> String {
    engines
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
