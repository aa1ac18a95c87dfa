//! Podcaster Core Library
//!
//! Turns a structured podcast script into a single audio file by routing each
//! segment to a TTS engine, falling back across engines on failure, and
//! assembling the clips with pauses and level normalization.

pub mod assembler;
pub mod audio;
pub mod backend;
pub mod config;
pub mod error;
pub mod generator;
pub mod sanitize;
pub mod script;
pub mod script_gen;
pub mod selector;
pub mod synthesizer;

pub use assembler::PodcastResult;
pub use audio::AudioClip;
pub use backend::{BackendSet, EngineKind, TtsBackend};
pub use config::{Credentials, EnginePolicy, OutputFormat, PodcastConfig};
pub use error::PodcastError;
pub use generator::{PodcastEvent, PodcastGenerator, generate_podcast};
pub use script::{ScriptSegment, SegmentKind, parse_script};
pub use script_gen::{ScriptGenConfig, ScriptGenerator};
