//! Per-segment synthesis with fallback across engines.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::audio::AudioClip;
use crate::backend::{BackendSet, EngineKind, TtsBackend};
use crate::config::PodcastConfig;
use crate::error::PodcastError;
use crate::sanitize::sanitize_for_speech;
use crate::script::ScriptSegment;
use crate::selector;

/// One dispatch of a segment to one engine.
#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    pub segment: &'a ScriptSegment,
    pub engine_hint: EngineKind,
    pub voice_id: String,
}

impl<'a> SynthesisRequest<'a> {
    pub fn new(segment: &'a ScriptSegment, engine: EngineKind, config: &PodcastConfig) -> Self {
        Self {
            segment,
            engine_hint: engine,
            voice_id: config.voices.voice_for(engine, segment.kind).to_string(),
        }
    }

    /// Run the request on `backend`.
    ///
    /// Network adapters bound each call by the segment timeout themselves, so
    /// time spent queued for a request slot never counts against it.
    async fn dispatch(
        self,
        backend: &dyn TtsBackend,
        text: &str,
        config: &PodcastConfig,
    ) -> Result<AudioClip, PodcastError> {
        let clip = backend.synthesize(text, &self.voice_id, config).await?;

        if clip.is_empty() {
            return Err(PodcastError::backend(self.engine_hint, "returned an empty clip"));
        }
        Ok(clip)
    }
}

/// Synthesize one segment.
///
/// Returns `Ok(None)` when the sanitized text is empty. The returned clip is
/// already at `config.sample_rate`.
pub async fn synthesize_segment(
    segment: &ScriptSegment,
    config: &PodcastConfig,
    backends: &BackendSet,
) -> Result<Option<AudioClip>, PodcastError> {
    let text = sanitize_for_speech(&segment.content);
    if text.is_empty() {
        debug!(order = segment.order, "Skipping segment with no speakable text");
        return Ok(None);
    }

    let chain = selector::select(segment.kind, config, backends);
    synthesize_with_chain(segment, &text, &chain, config, backends.mock())
        .await
        .and_then(|clip| clip.resampled(config.sample_rate))
        .map(Some)
}

async fn synthesize_with_chain(
    segment: &ScriptSegment,
    text: &str,
    chain: &[Arc<dyn TtsBackend>],
    config: &PodcastConfig,
    mock: &Arc<dyn TtsBackend>,
) -> Result<AudioClip, PodcastError> {
    let mut attempted = Vec::with_capacity(chain.len() + 1);
    let mut last_error = String::from("no engine available");

    for backend in chain {
        let engine = backend.engine();
        attempted.push(engine);

        let request = SynthesisRequest::new(segment, engine, config);
        debug!(order = segment.order, engine = %engine, voice = %request.voice_id, "Synthesizing segment");

        match request.dispatch(backend.as_ref(), text, config).await {
            Ok(clip) => return Ok(clip),
            Err(e) => {
                warn!(
                    order = segment.order,
                    kind = %segment.kind,
                    "{}; trying next engine",
                    e
                );
                last_error = e.to_string();
            }
        }
    }

    if !attempted.contains(&EngineKind::Mock) {
        attempted.push(EngineKind::Mock);
        warn!(order = segment.order, "All engines failed, falling back to mock");

        match SynthesisRequest::new(segment, EngineKind::Mock, config)
            .dispatch(mock.as_ref(), text, config)
            .await
        {
            Ok(clip) => return Ok(clip),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(PodcastError::Synthesis {
        order: segment.order,
        kind: segment.kind,
        attempted,
        cause: last_error,
    })
}
