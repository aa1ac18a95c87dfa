//! Local Kokoro synthesis using kokoro-tiny.

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::{EngineKind, TtsBackend};
use crate::audio::{AudioClip, silence_samples};
use crate::config::PodcastConfig;
use crate::error::PodcastError;

/// Kokoro renders at 24 kHz.
pub const KOKORO_SAMPLE_RATE: u32 = 24000;

/// Kokoro-tiny has a strict input limit; stay well under it.
const MAX_CHUNK_CHARS: usize = 200;

/// Pause between chunks of one segment.
const CHUNK_PAUSE_SECS: f32 = 0.3;

struct LoadedEngine {
    engine: Mutex<TtsEngine>,
    voices: Vec<String>,
}

/// Kokoro adapter. Unavailable when the model could not be loaded.
pub struct KokoroBackend {
    inner: Result<Arc<LoadedEngine>, String>,
}

impl KokoroBackend {
    /// Load the model (downloads it on first run). Failure is recorded, not returned.
    pub async fn initialize() -> Self {
        match TtsEngine::new().await {
            Ok(engine) => {
                let voices = engine.voices();
                debug!(voices = voices.len(), "Kokoro engine loaded");
                Self {
                    inner: Ok(Arc::new(LoadedEngine {
                        engine: Mutex::new(engine),
                        voices,
                    })),
                }
            }
            Err(e) => {
                warn!("Kokoro unavailable: failed to initialize TTS: {}", e);
                Self::unavailable(format!("failed to initialize: {}", e))
            }
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            inner: Err(reason.into()),
        }
    }

    /// Voices the loaded model provides.
    pub fn available_voices(&self) -> &[String] {
        match &self.inner {
            Ok(loaded) => &loaded.voices,
            Err(_) => &[],
        }
    }
}

#[async_trait]
impl TtsBackend for KokoroBackend {
    fn engine(&self) -> EngineKind {
        EngineKind::Kokoro
    }

    fn is_available(&self) -> bool {
        self.inner.is_ok()
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        _config: &PodcastConfig,
    ) -> Result<AudioClip, PodcastError> {
        let loaded = match &self.inner {
            Ok(loaded) => Arc::clone(loaded),
            Err(reason) => {
                return Err(PodcastError::backend(EngineKind::Kokoro, reason.clone()));
            }
        };

        if !loaded.voices.iter().any(|v| v == voice_id) {
            return Err(PodcastError::backend(
                EngineKind::Kokoro,
                format!("unknown voice '{}'", voice_id),
            ));
        }

        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        let voice_id = voice_id.to_string();

        let samples = tokio::task::spawn_blocking(move || render_chunks(&loaded, &chunks, &voice_id))
            .await
            .map_err(|e| {
                PodcastError::backend(EngineKind::Kokoro, format!("synthesis task failed: {}", e))
            })??;

        if samples.is_empty() {
            return Err(PodcastError::backend(
                EngineKind::Kokoro,
                "engine returned no audio",
            ));
        }

        Ok(AudioClip::new(samples, KOKORO_SAMPLE_RATE))
    }
}

fn render_chunks(
    loaded: &LoadedEngine,
    chunks: &[String],
    voice_id: &str,
) -> Result<Vec<f32>, PodcastError> {
    let mut engine = loaded
        .engine
        .lock()
        .map_err(|_| PodcastError::backend(EngineKind::Kokoro, "engine lock poisoned"))?;

    let pause = silence_samples(CHUNK_PAUSE_SECS, KOKORO_SAMPLE_RATE);
    let mut all_samples = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            all_samples.extend(std::iter::repeat_n(0.0, pause));
        }

        let samples = engine
            .synthesize(chunk, Some(voice_id))
            .map_err(|e| PodcastError::backend(EngineKind::Kokoro, format!("{}", e)))?;
        all_samples.extend(samples);
    }

    Ok(all_samples)
}

/// Split text into chunks that are safe for Kokoro.
///
/// Sentences are kept whole where possible; overlong sentences are split on
/// commas, then on whitespace.
pub(crate) fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if sentence.len() <= max_chars {
            push_piece(sentence, max_chars, &mut current, &mut chunks);
            continue;
        }

        for part in sentence.split_inclusive(',') {
            let part = part.trim();
            if part.len() <= max_chars {
                push_piece(part, max_chars, &mut current, &mut chunks);
            } else {
                for word in part.split_whitespace() {
                    for piece in split_word(word, max_chars) {
                        push_piece(piece, max_chars, &mut current, &mut chunks);
                    }
                }
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Cut a word into pieces of at most `max_chars` bytes on char boundaries.
fn split_word(word: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, ch) in word.char_indices() {
        if idx + ch.len_utf8() - start > max_chars && idx > start {
            pieces.push(&word[start..idx]);
            start = idx;
        }
    }
    if start < word.len() {
        pieces.push(&word[start..]);
    }
    pieces
}

fn push_piece(piece: &str, max_chars: usize, current: &mut String, chunks: &mut Vec<String>) {
    if !current.is_empty() && current.len() + piece.len() + 1 > max_chars {
        chunks.push(std::mem::take(current));
    }
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(piece);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_into_chunks_respects_limit() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 30, "chunk too long: {chunk:?}");
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_split_long_sentence_on_commas() {
        let text = "alpha beta gamma, delta epsilon zeta, eta theta iota, kappa lambda mu.";
        let chunks = split_into_chunks(text, 25);
        assert!(chunks.iter().all(|c| c.len() <= 25));
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_split_oversized_word() {
        let token = "x".repeat(450);
        let chunks = split_into_chunks(&format!("See {} now.", token), 200);
        assert!(chunks.iter().all(|c| c.len() <= 200));
        let joined: String = chunks.concat().chars().filter(|c| *c == 'x').collect();
        assert_eq!(joined.len(), 450);

        // Multibyte characters are never cut in half.
        let token = "é".repeat(150);
        let chunks = split_into_chunks(&token, 200);
        assert!(chunks.iter().all(|c| c.len() <= 200));
        assert_eq!(chunks.concat(), token);
    }

    #[test]
    fn test_split_short_text_single_chunk() {
        assert_eq!(split_into_chunks("Short one", 200), vec!["Short one"]);
        assert!(split_into_chunks("   ", 200).is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_backend_errors() {
        let backend = KokoroBackend::unavailable("no weights");
        assert!(!backend.is_available());
        assert!(backend.available_voices().is_empty());

        let err = backend
            .synthesize("hello", "af_sky", &PodcastConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PodcastError::Backend {
                engine: EngineKind::Kokoro,
                ..
            }
        ));
    }
}
