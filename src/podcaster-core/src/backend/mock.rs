//! Deterministic sine-tone engine.

use async_trait::async_trait;
use std::f32::consts::PI;

use super::{EngineKind, TtsBackend};
use crate::audio::AudioClip;
use crate::config::PodcastConfig;
use crate::error::PodcastError;

const TONE_HZ: f32 = 440.0;
const TONE_AMPLITUDE: f32 = 0.3;

/// Stands in for a real engine: a tone whose length follows the word count.
#[derive(Debug, Clone, Default)]
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }

    /// Seconds of speech `text` would take at `words_per_minute`.
    pub fn estimated_duration(text: &str, words_per_minute: f32) -> f32 {
        let words = text.split_whitespace().count().max(1);
        words as f32 * 60.0 / words_per_minute
    }

    fn tone(seconds: f32, sample_rate: u32) -> Vec<f32> {
        let len = (seconds as f64 * sample_rate as f64).round() as usize;
        (0..len.max(1))
            .map(|i| TONE_AMPLITUDE * (2.0 * PI * TONE_HZ * i as f32 / sample_rate as f32).sin())
            .collect()
    }
}

#[async_trait]
impl TtsBackend for MockBackend {
    fn engine(&self) -> EngineKind {
        EngineKind::Mock
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn synthesize(
        &self,
        text: &str,
        _voice_id: &str,
        config: &PodcastConfig,
    ) -> Result<AudioClip, PodcastError> {
        let seconds = Self::estimated_duration(text, config.mock_words_per_minute);
        Ok(AudioClip::new(
            Self::tone(seconds, config.sample_rate),
            config.sample_rate,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::peak_amplitude;

    #[test]
    fn test_duration_follows_word_count() {
        assert_eq!(MockBackend::estimated_duration("one", 150.0), 0.4);
        assert_eq!(MockBackend::estimated_duration("one two three", 150.0), 1.2);
        assert_eq!(MockBackend::estimated_duration("", 150.0), 0.4);
    }

    #[tokio::test]
    async fn test_synthesize_is_deterministic() {
        let config = PodcastConfig::default();
        let backend = MockBackend::new();
        let a = backend.synthesize("Hello world.", "mock", &config).await.unwrap();
        let b = backend.synthesize("Hello world.", "mock", &config).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.sample_rate, config.sample_rate);
        assert_eq!(a.len(), 19200);
        assert!(peak_amplitude(&a.samples) <= TONE_AMPLITUDE + 1e-6);
        assert!(peak_amplitude(&a.samples) > 0.0);
    }
}
