//! Configuration for a podcast generation run.
//!
//! `PodcastConfig` is built once (from TOML, defaults, and CLI overrides),
//! validated, and then shared read-only by every pipeline stage.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::EngineKind;
use crate::error::PodcastError;
use crate::script::SegmentKind;

/// Engine selection policy.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnginePolicy {
    Kokoro,
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
    /// Pick the preferred engine per segment kind, falling back to the others.
    #[default]
    Mixed,
    Mock,
}

impl EnginePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnginePolicy::Kokoro => "kokoro",
            EnginePolicy::ElevenLabs => "elevenlabs",
            EnginePolicy::Mixed => "mixed",
            EnginePolicy::Mock => "mock",
        }
    }

    /// Whether any segment under this policy may be routed to `engine`.
    pub fn uses(&self, engine: EngineKind) -> bool {
        match self {
            EnginePolicy::Mixed => true,
            EnginePolicy::Kokoro => engine == EngineKind::Kokoro,
            EnginePolicy::ElevenLabs => engine == EngineKind::ElevenLabs,
            EnginePolicy::Mock => engine == EngineKind::Mock,
        }
    }
}

impl FromStr for EnginePolicy {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kokoro" => Ok(EnginePolicy::Kokoro),
            "elevenlabs" => Ok(EnginePolicy::ElevenLabs),
            "mixed" => Ok(EnginePolicy::Mixed),
            "mock" => Ok(EnginePolicy::Mock),
            other => Err(PodcastError::Config(format!(
                "Unknown tts_engine '{}'. Expected one of: kokoro, elevenlabs, mixed, mock",
                other
            ))),
        }
    }
}

impl fmt::Display for EnginePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container format of the output file.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
    Flac,
    Ogg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Flac => "flac",
            OutputFormat::Ogg => "ogg",
        }
    }

    /// Formats the assembler can encode.
    pub fn is_supported(&self) -> bool {
        matches!(self, OutputFormat::Wav)
    }
}

impl FromStr for OutputFormat {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            "flac" => Ok(OutputFormat::Flac),
            "ogg" => Ok(OutputFormat::Ogg),
            other => Err(PodcastError::Config(format!(
                "Unknown output_format '{}'",
                other
            ))),
        }
    }
}

/// Voice identifiers per engine and segment role.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoicesConfig {
    pub kokoro_headline: String,
    pub kokoro_text: String,
    pub elevenlabs_headline: String,
    pub elevenlabs_text: String,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            kokoro_headline: "am_michael".to_string(),
            kokoro_text: "af_sky".to_string(),
            elevenlabs_headline: "JBFqnCBsd6RMkjVDRZzb".to_string(),
            elevenlabs_text: "JBFqnCBsd6RMkjVDRZzb".to_string(),
        }
    }
}

impl VoicesConfig {
    /// Voice to use for a segment kind on a given engine.
    pub fn voice_for(&self, engine: EngineKind, kind: SegmentKind) -> &str {
        match (engine, kind) {
            (EngineKind::Kokoro, SegmentKind::Headline) => &self.kokoro_headline,
            (EngineKind::Kokoro, SegmentKind::Text) => &self.kokoro_text,
            (EngineKind::ElevenLabs, SegmentKind::Headline) => &self.elevenlabs_headline,
            (EngineKind::ElevenLabs, SegmentKind::Text) => &self.elevenlabs_text,
            (EngineKind::Mock, _) => "mock",
        }
    }
}

/// ElevenLabs request settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ElevenLabsConfig {
    pub base_url: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    /// Native PCM rate requested from the API.
    pub native_sample_rate: u32,
    /// Requests allowed in flight per adapter instance.
    pub max_concurrent_requests: usize,
    /// Retries after HTTP 429 / 5xx responses.
    pub max_retries: u32,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            native_sample_rate: 24000,
            max_concurrent_requests: 1,
            max_retries: 2,
        }
    }
}

/// Immutable settings for one podcast generation run.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PodcastConfig {
    pub tts_engine: EnginePolicy,
    pub sample_rate: u32,
    pub output_format: OutputFormat,
    /// Pause after a Text segment, in seconds.
    pub silence_duration: f32,
    /// Pause after a Headline segment, in seconds.
    pub headline_silence: f32,
    pub normalize_audio: bool,
    /// Peak amplitude after normalization.
    pub normalize_ceiling: f32,
    pub voices: VoicesConfig,
    pub elevenlabs: ElevenLabsConfig,
    /// Timeout for a single network synthesis attempt, in seconds.
    pub segment_timeout_secs: u64,
    /// Segments synthesized concurrently.
    pub max_parallel_segments: usize,
    /// Speaking rate assumed by the mock engine.
    pub mock_words_per_minute: f32,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            tts_engine: EnginePolicy::Mixed,
            sample_rate: 24000,
            output_format: OutputFormat::Wav,
            silence_duration: 0.5,
            headline_silence: 1.0,
            normalize_audio: true,
            normalize_ceiling: 0.95,
            voices: VoicesConfig::default(),
            elevenlabs: ElevenLabsConfig::default(),
            segment_timeout_secs: 60,
            max_parallel_segments: 4,
            mock_words_per_minute: 150.0,
        }
    }
}

impl PodcastConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PodcastError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PodcastError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self, PodcastError> {
        toml::from_str(content)
            .map_err(|e| PodcastError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Reject settings that would make a run fail halfway through.
    pub fn validate(&self) -> Result<(), PodcastError> {
        if self.sample_rate == 0 {
            return Err(PodcastError::Config("sample_rate must be positive".to_string()));
        }
        if !self.output_format.is_supported() {
            return Err(PodcastError::Config(format!(
                "output_format '{}' is not supported; only wav can be written",
                self.output_format.extension()
            )));
        }
        for (name, value) in [
            ("silence_duration", self.silence_duration),
            ("headline_silence", self.headline_silence),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PodcastError::Config(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        if !(self.normalize_ceiling > 0.0 && self.normalize_ceiling <= 1.0) {
            return Err(PodcastError::Config(format!(
                "normalize_ceiling must be in (0, 1], got {}",
                self.normalize_ceiling
            )));
        }
        for (name, value) in [
            ("elevenlabs.stability", self.elevenlabs.stability),
            ("elevenlabs.similarity_boost", self.elevenlabs.similarity_boost),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PodcastError::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }
        if self.elevenlabs.max_concurrent_requests == 0 {
            return Err(PodcastError::Config(
                "elevenlabs.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.elevenlabs.native_sample_rate == 0 {
            return Err(PodcastError::Config(
                "elevenlabs.native_sample_rate must be positive".to_string(),
            ));
        }
        if self.max_parallel_segments == 0 {
            return Err(PodcastError::Config(
                "max_parallel_segments must be at least 1".to_string(),
            ));
        }
        if self.segment_timeout_secs == 0 {
            return Err(PodcastError::Config(
                "segment_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(self.mock_words_per_minute > 0.0) {
            return Err(PodcastError::Config(
                "mock_words_per_minute must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn segment_timeout(&self) -> Duration {
        Duration::from_secs(self.segment_timeout_secs)
    }

    /// Pause inserted after a segment of the given kind, in seconds.
    pub fn silence_after(&self, kind: SegmentKind) -> f32 {
        match kind {
            SegmentKind::Headline => self.headline_silence,
            SegmentKind::Text => self.silence_duration,
        }
    }
}

/// API keys supplied by the caller. The core never reads the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub elevenlabs_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
}

impl Credentials {
    pub fn elevenlabs_key(&self) -> Option<&str> {
        non_empty(self.elevenlabs_api_key.as_deref())
    }

    pub fn openrouter_key(&self) -> Option<&str> {
        non_empty(self.openrouter_api_key.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
