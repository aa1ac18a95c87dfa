//! Concatenation of segment clips into the final audio file.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::Serialize;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::audio::{AudioClip, normalize_peak, silence_samples};
use crate::config::PodcastConfig;
use crate::error::PodcastError;
use crate::script::ScriptSegment;

/// Metadata of a written podcast, read back from the file itself.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PodcastResult {
    pub file_path: PathBuf,
    pub duration_seconds: f64,
    pub size_bytes: u64,
    pub segment_count: usize,
}

/// Concatenate clips in segment order, insert pauses, normalize and write.
///
/// The file is written to a temporary path next to `output_path` and renamed
/// into place only when complete.
pub fn assemble(
    mut clips: Vec<(ScriptSegment, AudioClip)>,
    output_path: &Path,
    config: &PodcastConfig,
) -> Result<PodcastResult, PodcastError> {
    if clips.is_empty() {
        return Err(PodcastError::Assembly(
            "no synthesized segments to assemble".to_string(),
        ));
    }

    clips.sort_by_key(|(segment, _)| segment.order);
    let segment_count = clips.len();
    let buffer = concatenate(clips, config)?;

    write_atomically(&buffer, output_path, config.sample_rate)?;

    let result = inspect(output_path, segment_count)?;
    info!(
        path = %result.file_path.display(),
        duration = result.duration_seconds,
        bytes = result.size_bytes,
        segments = result.segment_count,
        "Podcast written"
    );
    Ok(result)
}

/// Build the output buffer from clips already sorted by order.
fn concatenate(
    clips: Vec<(ScriptSegment, AudioClip)>,
    config: &PodcastConfig,
) -> Result<Vec<f32>, PodcastError> {
    let last = clips.len() - 1;
    let mut buffer = Vec::new();

    for (i, (segment, clip)) in clips.into_iter().enumerate() {
        let clip = clip.resampled(config.sample_rate)?;
        debug!(
            order = segment.order,
            kind = %segment.kind,
            seconds = clip.duration_secs(),
            "Appending segment"
        );
        buffer.extend(clip.samples);

        if i < last {
            let pause = silence_samples(config.silence_after(segment.kind), config.sample_rate);
            buffer.extend(std::iter::repeat_n(0.0, pause));
        }
    }

    if config.normalize_audio {
        normalize_peak(&mut buffer, config.normalize_ceiling);
    }

    Ok(buffer)
}

fn write_atomically(samples: &[f32], output_path: &Path, sample_rate: u32) -> Result<(), PodcastError> {
    let dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| {
        PodcastError::Assembly(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    let temp = tempfile::Builder::new()
        .prefix(".podcast-")
        .suffix(".partial")
        .tempfile_in(&dir)
        .map_err(|e| PodcastError::Assembly(format!("Failed to create temporary file: {}", e)))?;

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    {
        let mut writer = WavWriter::new(BufWriter::new(temp.as_file()), spec)
            .map_err(|e| PodcastError::Assembly(format!("Failed to start WAV: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(to_pcm16(sample))
                .map_err(|e| PodcastError::Assembly(format!("Failed to write WAV: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| PodcastError::Assembly(format!("Failed to finalize WAV: {}", e)))?;
    }

    temp.persist(output_path).map_err(|e| {
        PodcastError::Assembly(format!(
            "Failed to move podcast into {}: {}",
            output_path.display(),
            e
        ))
    })?;

    Ok(())
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Read duration and size from the written file.
fn inspect(path: &Path, segment_count: usize) -> Result<PodcastResult, PodcastError> {
    let reader = WavReader::open(path)
        .map_err(|e| PodcastError::Assembly(format!("Failed to reopen output: {}", e)))?;
    let spec = reader.spec();
    let duration_seconds = reader.duration() as f64 / spec.sample_rate as f64;

    let size_bytes = fs::metadata(path)
        .map_err(|e| PodcastError::Assembly(format!("Failed to stat output: {}", e)))?
        .len();

    Ok(PodcastResult {
        file_path: path.to_path_buf(),
        duration_seconds,
        size_bytes,
        segment_count,
    })
}
