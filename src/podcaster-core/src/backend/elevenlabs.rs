//! ElevenLabs remote synthesis.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{EngineKind, TtsBackend};
use crate::audio::{AudioClip, decode_pcm_s16le};
use crate::config::PodcastConfig;
use crate::error::PodcastError;

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs adapter. Unavailable without an API key.
pub struct ElevenLabsBackend {
    api_key: Option<String>,
    client: Client,
    /// Limits requests in flight from this adapter.
    permits: Semaphore,
}

impl ElevenLabsBackend {
    pub fn new(api_key: Option<&str>, config: &PodcastConfig) -> Result<Self, PodcastError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PodcastError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.map(str::to_string),
            client,
            permits: Semaphore::new(config.elevenlabs.max_concurrent_requests.max(1)),
        })
    }

    /// An adapter with no credential.
    pub fn disabled() -> Self {
        Self {
            api_key: None,
            client: Client::new(),
            permits: Semaphore::new(1),
        }
    }

    async fn request_once(
        &self,
        api_key: &str,
        text: &str,
        voice_id: &str,
        config: &PodcastConfig,
    ) -> Result<Vec<u8>, RequestFailure> {
        let settings = &config.elevenlabs;
        let url = format!(
            "{}/v1/text-to-speech/{}?output_format=pcm_{}",
            settings.base_url.trim_end_matches('/'),
            voice_id,
            settings.native_sample_rate
        );

        let body = SynthesizeRequest {
            text,
            model_id: &settings.model_id,
            voice_settings: VoiceSettings {
                stability: settings.stability,
                similarity_boost: settings.similarity_boost,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RequestFailure::fatal(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("API error {}: {}", status, detail.trim());
            return Err(if is_retryable(status) {
                RequestFailure::retryable(message)
            } else {
                RequestFailure::fatal(message)
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| RequestFailure::fatal(format!("failed to read audio bytes: {}", e)))
    }
}

struct RequestFailure {
    message: String,
    retryable: bool,
}

impl RequestFailure {
    fn fatal(message: String) -> Self {
        Self {
            message,
            retryable: false,
        }
    }

    fn retryable(message: String) -> Self {
        Self {
            message,
            retryable: true,
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl TtsBackend for ElevenLabsBackend {
    fn engine(&self) -> EngineKind {
        EngineKind::ElevenLabs
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        config: &PodcastConfig,
    ) -> Result<AudioClip, PodcastError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PodcastError::backend(EngineKind::ElevenLabs, "no API key configured"))?;

        let _permit = self.permits.acquire().await.map_err(|e| {
            PodcastError::backend(EngineKind::ElevenLabs, format!("rate limiter closed: {}", e))
        })?;

        let max_retries = config.elevenlabs.max_retries;
        let timeout = config.segment_timeout();
        let mut attempt = 0;
        let bytes = loop {
            // Only the request itself is timed, not the permit wait or backoff.
            let request = self.request_once(api_key, text, voice_id, config);
            let outcome = tokio::time::timeout(timeout, request).await.unwrap_or_else(|_| {
                Err(RequestFailure::fatal(format!(
                    "request timed out after {}s",
                    config.segment_timeout_secs
                )))
            });

            match outcome {
                Ok(bytes) => break bytes,
                Err(failure) if failure.retryable && attempt < max_retries => {
                    attempt += 1;
                    // Exponential backoff: 1s, 2s, 4s
                    let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                    warn!(
                        "ElevenLabs {} (retry {}/{} in {:?})",
                        failure.message, attempt, max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    return Err(PodcastError::backend(EngineKind::ElevenLabs, failure.message));
                }
            }
        };

        if bytes.is_empty() {
            return Err(PodcastError::backend(
                EngineKind::ElevenLabs,
                "API returned an empty audio body",
            ));
        }

        let samples = decode_pcm_s16le(&bytes)
            .map_err(|e| PodcastError::backend(EngineKind::ElevenLabs, e))?;
        debug!(
            bytes = bytes.len(),
            native_rate = config.elevenlabs.native_sample_rate,
            "ElevenLabs audio decoded"
        );

        AudioClip::new(samples, config.elevenlabs.native_sample_rate).resampled(config.sample_rate)
    }
}
