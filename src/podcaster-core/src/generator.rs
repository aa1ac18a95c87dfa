//! Podcast generation: script text in, audio file out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use crate::assembler::{self, PodcastResult};
use crate::audio::AudioClip;
use crate::backend::BackendSet;
use crate::config::PodcastConfig;
use crate::error::PodcastError;
use crate::script::{ScriptSegment, parse_script};
use crate::synthesizer::synthesize_segment;

/// Progress events emitted during generation.
#[derive(Debug, Clone)]
pub enum PodcastEvent {
    /// The script was parsed.
    Parsed { segments: usize },
    /// A segment finished synthesizing (or was skipped).
    SegmentDone {
        order: usize,
        total: usize,
        skipped: bool,
    },
    /// All clips are being concatenated and written.
    Assembling,
}

/// Callback for generation events.
pub type PodcastCallback = Arc<dyn Fn(PodcastEvent) + Send + Sync>;

/// Runs the parse → synthesize → assemble pipeline against a backend set.
pub struct PodcastGenerator {
    backends: BackendSet,
    callback: Option<PodcastCallback>,
}

impl PodcastGenerator {
    pub fn new(backends: BackendSet) -> Self {
        Self {
            backends,
            callback: None,
        }
    }

    /// Set a callback for progress events.
    pub fn with_callback(mut self, callback: PodcastCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Render `script_text` to `output_path`.
    ///
    /// Segments synthesize concurrently (up to `max_parallel_segments`) but are
    /// always assembled in script order. On any fatal error no file is written.
    pub async fn generate(
        &self,
        script_text: &str,
        output_path: impl AsRef<Path>,
        config: PodcastConfig,
    ) -> Result<PodcastResult, PodcastError> {
        config.validate()?;
        let config = Arc::new(config);
        let output_path: PathBuf = output_path.as_ref().to_path_buf();

        let segments = parse_script(script_text)?;
        let total = segments.len();
        info!(segments = total, policy = %config.tts_engine, "Parsed script");
        self.emit(PodcastEvent::Parsed { segments: total });

        let clips = self.synthesize_all(segments, &config).await?;

        self.emit(PodcastEvent::Assembling);
        let assemble_config = Arc::clone(&config);
        tokio::task::spawn_blocking(move || {
            assembler::assemble(clips, &output_path, &assemble_config)
        })
        .await
        .map_err(|e| PodcastError::Assembly(format!("assembly task failed: {}", e)))?
    }

    async fn synthesize_all(
        &self,
        segments: Vec<ScriptSegment>,
        config: &Arc<PodcastConfig>,
    ) -> Result<Vec<(ScriptSegment, AudioClip)>, PodcastError> {
        let total = segments.len();
        let permits = Arc::new(Semaphore::new(config.max_parallel_segments));
        let mut tasks = JoinSet::new();

        for segment in segments {
            let permits = Arc::clone(&permits);
            let config = Arc::clone(config);
            let backends = self.backends.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|e| {
                    PodcastError::Assembly(format!("worker pool closed: {}", e))
                })?;
                let clip = synthesize_segment(&segment, &config, &backends).await?;
                Ok::<_, PodcastError>((segment, clip))
            });
        }

        let mut clips = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let (segment, clip) = joined
                .map_err(|e| PodcastError::Assembly(format!("synthesis task failed: {}", e)))??;

            self.emit(PodcastEvent::SegmentDone {
                order: segment.order,
                total,
                skipped: clip.is_none(),
            });
            if let Some(clip) = clip {
                clips.push((segment, clip));
            }
        }

        clips.sort_by_key(|(segment, _)| segment.order);
        Ok(clips)
    }

    fn emit(&self, event: PodcastEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

/// Generate a podcast from script text with the given backends.
pub async fn generate_podcast(
    script_text: &str,
    output_path: impl AsRef<Path>,
    config: PodcastConfig,
    backends: BackendSet,
) -> Result<PodcastResult, PodcastError> {
    PodcastGenerator::new(backends)
        .generate(script_text, output_path, config)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnginePolicy;
    use std::sync::Mutex;

    fn mock_config() -> PodcastConfig {
        PodcastConfig {
            tts_engine: EnginePolicy::Mock,
            ..PodcastConfig::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = mock_config();
        config.max_parallel_segments = 0;

        let err = generate_podcast("no markers", dir.path().join("x.wav"), config, BackendSet::mock_only())
            .await
            .unwrap_err();
        assert!(matches!(err, PodcastError::Config(_)));
    }

    #[tokio::test]
    async fn test_parse_error_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.wav");
        let err = generate_podcast("nothing here", &path, mock_config(), BackendSet::mock_only())
            .await
            .unwrap_err();
        assert!(matches!(err, PodcastError::Parse(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_events_cover_every_segment() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let generator = PodcastGenerator::new(BackendSet::mock_only()).with_callback(Arc::new(
            move |event| {
                if let PodcastEvent::SegmentDone { order, .. } = event {
                    sink.lock().unwrap().push(order);
                }
            },
        ));

        let result = generator
            .generate(
                "Headline: A\nText: one two\nText: https://only.a.link\nHeadline: B",
                dir.path().join("out.wav"),
                mock_config(),
            )
            .await
            .unwrap();

        let mut orders = seen.lock().unwrap().clone();
        orders.sort();
        assert_eq!(orders, vec![0, 1, 2, 3]);
        // The link-only segment is skipped.
        assert_eq!(result.segment_count, 3);
    }

    #[tokio::test]
    async fn test_only_unspeakable_segments_is_assembly_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let err = generate_podcast("Text: https://example.com", &path, mock_config(), BackendSet::mock_only())
            .await
            .unwrap_err();
        assert!(matches!(err, PodcastError::Assembly(_)));
        assert!(!path.exists());
    }
}
