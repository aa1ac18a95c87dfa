//! End-to-end pipeline tests using the mock engine.

use std::fs;
use std::sync::Arc;

use podcaster_core::backend::{ElevenLabsBackend, KokoroBackend, MockBackend};
use podcaster_core::{
    BackendSet, EnginePolicy, PodcastConfig, PodcastError, generate_podcast,
};

fn config(policy: EnginePolicy) -> PodcastConfig {
    PodcastConfig {
        tts_engine: policy,
        sample_rate: 24000,
        silence_duration: 0.5,
        headline_silence: 1.0,
        ..PodcastConfig::default()
    }
}

fn read_samples(path: &std::path::Path) -> (Vec<i16>, u32) {
    let mut reader = hound::WavReader::open(path).unwrap();
    let rate = reader.spec().sample_rate;
    let samples = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    (samples, rate)
}

#[tokio::test]
async fn test_welcome_scenario_duration_and_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("welcome.wav");

    let result = generate_podcast(
        "Headline: Welcome\nText: Hello world.",
        &path,
        config(EnginePolicy::Mock),
        BackendSet::mock_only(),
    )
    .await
    .unwrap();

    // Headline: 1 word = 0.4s, pause 1.0s, Text: 2 words = 0.8s, no trailing pause.
    assert_eq!(result.segment_count, 2);
    assert!((result.duration_seconds - 2.2).abs() < 1.0 / 24000.0);
    assert_eq!(result.size_bytes, fs::metadata(&path).unwrap().len());

    let (samples, rate) = read_samples(&path);
    assert_eq!(rate, 24000);
    assert_eq!(samples.len(), 9600 + 24000 + 19200);
    // The headline pause is silent and the file ends on speech, not silence.
    assert!(samples[9600..33600].iter().all(|&s| s == 0));
    assert!(samples[33600..].iter().any(|&s| s != 0));
}

#[tokio::test]
async fn test_duration_is_sum_of_clips_and_pauses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sum.wav");
    let script = "Headline: One two\nText: three four five\nText: six\nHeadline: seven\nText: eight nine";

    let result = generate_podcast(script, &path, config(EnginePolicy::Mock), BackendSet::mock_only())
        .await
        .unwrap();

    let words = [2.0, 3.0, 1.0, 1.0, 2.0];
    let speech: f64 = words.iter().map(|w| w * 0.4).sum();
    // Pauses follow: Headline, Text, Text, Headline (none after the last Text).
    let pauses = 1.0 + 0.5 + 0.5 + 1.0;
    assert_eq!(result.segment_count, 5);
    assert!((result.duration_seconds - (speech + pauses)).abs() <= 1.0 / 24000.0);
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.wav");
    let second = dir.path().join("b.wav");
    let script = "Headline: Welcome\nText: Hello world.\nHeadline: Results\nText: It works well.";

    generate_podcast(script, &first, config(EnginePolicy::Mock), BackendSet::mock_only())
        .await
        .unwrap();
    generate_podcast(script, &second, config(EnginePolicy::Mock), BackendSet::mock_only())
        .await
        .unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[tokio::test]
async fn test_normalization_toggle() {
    let dir = tempfile::tempdir().unwrap();
    let normalized = dir.path().join("norm.wav");
    let raw = dir.path().join("raw.wav");
    let script = "Text: Hello world.";

    generate_podcast(script, &normalized, config(EnginePolicy::Mock), BackendSet::mock_only())
        .await
        .unwrap();
    let mut cfg = config(EnginePolicy::Mock);
    cfg.normalize_audio = false;
    generate_podcast(script, &raw, cfg, BackendSet::mock_only())
        .await
        .unwrap();

    let peak = |path: &std::path::Path| {
        read_samples(path)
            .0
            .iter()
            .map(|&s| (s as f32 / i16::MAX as f32).abs())
            .fold(0.0f32, f32::max)
    };

    let normalized_peak = peak(&normalized);
    assert!(normalized_peak > 0.0);
    assert!(normalized_peak <= 0.95 + 1e-4);
    assert!(normalized_peak > 0.9);

    // The mock tone peaks at 0.3 and is left as is.
    let raw_peak = peak(&raw);
    assert!((raw_peak - 0.3).abs() < 1e-3);
}

#[tokio::test]
async fn test_mixed_without_real_engines_uses_mock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.wav");

    let result = generate_podcast(
        "Headline: Welcome\nText: Hello world.",
        &path,
        config(EnginePolicy::Mixed),
        BackendSet::mock_only(),
    )
    .await
    .unwrap();

    assert_eq!(result.segment_count, 2);
    assert!((result.duration_seconds - 2.2).abs() < 1.0 / 24000.0);
}

#[tokio::test]
async fn test_mixed_with_invalid_elevenlabs_credential_completes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fallback.wav");

    let mut cfg = config(EnginePolicy::Mixed);
    // Nothing listens here, so every ElevenLabs call fails fast.
    cfg.elevenlabs.base_url = "http://127.0.0.1:9".to_string();
    cfg.segment_timeout_secs = 5;

    let backends = BackendSet::new(
        Arc::new(KokoroBackend::unavailable("no model in tests")),
        Arc::new(ElevenLabsBackend::new(Some("not-a-real-key"), &cfg).unwrap()),
        Arc::new(MockBackend::new()),
    );

    let result = generate_podcast("Headline: Welcome\nText: Hello world.", &path, cfg, backends)
        .await
        .unwrap();

    assert_eq!(result.segment_count, 2);
    assert!(path.exists());
}

#[tokio::test]
async fn test_markerless_script_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("none.wav");

    let err = generate_podcast(
        "This is a paper summary without any markers.",
        &path,
        config(EnginePolicy::Mock),
        BackendSet::mock_only(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PodcastError::Parse(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_order_survives_parallel_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let serial = dir.path().join("serial.wav");
    let parallel = dir.path().join("parallel.wav");
    let script = (0..12)
        .map(|i| {
            if i % 3 == 0 {
                format!("Headline: Part {}", i)
            } else {
                format!("Text: {}", "word ".repeat(i + 1))
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut cfg = config(EnginePolicy::Mock);
    cfg.max_parallel_segments = 1;
    generate_podcast(&script, &serial, cfg, BackendSet::mock_only())
        .await
        .unwrap();

    let mut cfg = config(EnginePolicy::Mock);
    cfg.max_parallel_segments = 8;
    generate_podcast(&script, &parallel, cfg, BackendSet::mock_only())
        .await
        .unwrap();

    assert_eq!(fs::read(&serial).unwrap(), fs::read(&parallel).unwrap());
}
