//! TTS backend adapters.
//!
//! Every engine is wrapped behind [`TtsBackend`], which turns text into a mono
//! [`AudioClip`]. The set of engines is closed: Kokoro (local), ElevenLabs
//! (remote) and a deterministic mock used for tests and as the last fallback.

mod elevenlabs;
mod kokoro;
mod mock;

pub use elevenlabs::ElevenLabsBackend;
pub use kokoro::KokoroBackend;
pub use mock::MockBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::audio::AudioClip;
use crate::config::{Credentials, PodcastConfig};
use crate::error::PodcastError;

/// Identifies one of the supported synthesis engines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Kokoro,
    ElevenLabs,
    Mock,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Kokoro => "kokoro",
            EngineKind::ElevenLabs => "elevenlabs",
            EngineKind::Mock => "mock",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform text-to-waveform contract implemented by each engine adapter.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Which engine this adapter wraps.
    fn engine(&self) -> EngineKind;

    /// Whether the engine can currently be called at all.
    fn is_available(&self) -> bool;

    /// Synthesize `text` with `voice_id`.
    ///
    /// A successful result is never empty.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        config: &PodcastConfig,
    ) -> Result<AudioClip, PodcastError>;
}

/// One adapter per engine, resolved by [`EngineKind`].
#[derive(Clone)]
pub struct BackendSet {
    kokoro: Arc<dyn TtsBackend>,
    elevenlabs: Arc<dyn TtsBackend>,
    mock: Arc<dyn TtsBackend>,
}

impl BackendSet {
    pub fn new(
        kokoro: Arc<dyn TtsBackend>,
        elevenlabs: Arc<dyn TtsBackend>,
        mock: Arc<dyn TtsBackend>,
    ) -> Self {
        Self {
            kokoro,
            elevenlabs,
            mock,
        }
    }

    /// Build the adapters for a run.
    ///
    /// Kokoro is only initialized (which may download model weights) when the
    /// policy can route segments to it.
    pub async fn initialize(
        config: &PodcastConfig,
        credentials: &Credentials,
    ) -> Result<Self, PodcastError> {
        let kokoro = if config.tts_engine.uses(EngineKind::Kokoro) {
            KokoroBackend::initialize().await
        } else {
            KokoroBackend::unavailable(format!("not used by '{}' policy", config.tts_engine))
        };

        let elevenlabs = ElevenLabsBackend::new(credentials.elevenlabs_key(), config)?;

        let set = Self::new(
            Arc::new(kokoro),
            Arc::new(elevenlabs),
            Arc::new(MockBackend::new()),
        );
        info!(
            kokoro = set.kokoro.is_available(),
            elevenlabs = set.elevenlabs.is_available(),
            "TTS backends ready"
        );
        Ok(set)
    }

    /// A set where only the mock engine is available.
    pub fn mock_only() -> Self {
        Self::new(
            Arc::new(KokoroBackend::unavailable("mock-only backend set")),
            Arc::new(ElevenLabsBackend::disabled()),
            Arc::new(MockBackend::new()),
        )
    }

    /// Replace the adapter for `engine`.
    pub fn with_backend(mut self, backend: Arc<dyn TtsBackend>) -> Self {
        match backend.engine() {
            EngineKind::Kokoro => self.kokoro = backend,
            EngineKind::ElevenLabs => self.elevenlabs = backend,
            EngineKind::Mock => self.mock = backend,
        }
        self
    }

    pub fn get(&self, engine: EngineKind) -> &Arc<dyn TtsBackend> {
        match engine {
            EngineKind::Kokoro => &self.kokoro,
            EngineKind::ElevenLabs => &self.elevenlabs,
            EngineKind::Mock => &self.mock,
        }
    }

    pub fn mock(&self) -> &Arc<dyn TtsBackend> {
        &self.mock
    }
}
