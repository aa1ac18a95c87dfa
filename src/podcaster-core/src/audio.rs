//! In-memory audio clips and the sample-level operations the assembler needs.

use rubato::{FftFixedIn, Resampler};

use crate::error::PodcastError;

/// Mono waveform with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Samples in [-1, 1].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Zero-amplitude clip of the given length in seconds, rounded to whole samples.
    pub fn silence(seconds: f32, sample_rate: u32) -> Self {
        Self::new(vec![0.0; silence_samples(seconds, sample_rate)], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert to `target_rate`, returning the clip unchanged when rates match.
    pub fn resampled(self, target_rate: u32) -> Result<Self, PodcastError> {
        if self.sample_rate == target_rate {
            return Ok(self);
        }
        let samples = resample(&self.samples, self.sample_rate, target_rate)?;
        Ok(Self::new(samples, target_rate))
    }
}

/// Number of samples in `seconds` of audio at `sample_rate`.
pub fn silence_samples(seconds: f32, sample_rate: u32) -> usize {
    (seconds as f64 * sample_rate as f64).round() as usize
}

/// Length of `len` samples after conversion from `from_rate` to `to_rate`.
pub fn resampled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    (len as f64 * to_rate as f64 / from_rate as f64).round() as usize
}

const RESAMPLE_CHUNK: usize = 1024;

/// Band-limited resampling with rubato's FFT resampler.
///
/// The resampler's delay is trimmed and the tail flushed with zeros, so the
/// output is aligned with the input and exactly `resampled_len` long.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, PodcastError> {
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let expected = resampled_len(input.len(), from_rate, to_rate);
    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| PodcastError::Audio(format!("failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(delay + expected + RESAMPLE_CHUNK);
    let mut pos = 0;

    while output.len() < delay + expected {
        let frames_needed = resampler.input_frames_next();
        let end = (pos + frames_needed).min(input.len());

        let mut chunk = input[pos..end].to_vec();
        chunk.resize(frames_needed, 0.0);
        pos = end;

        let frames = vec![chunk];
        let resampled = resampler
            .process(&frames, None)
            .map_err(|e| PodcastError::Audio(format!("resampling failed: {}", e)))?;
        if let Some(channel) = resampled.into_iter().next() {
            output.extend(channel);
        }
    }

    Ok(output.into_iter().skip(delay).take(expected).collect())
}

/// Largest absolute sample value.
pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}

/// Peaks below this are treated as silence and left alone.
pub const MIN_NORMALIZE_PEAK: f32 = 1e-6;

/// Scale the whole buffer so its peak sits at `ceiling`.
pub fn normalize_peak(samples: &mut [f32], ceiling: f32) {
    let peak = peak_amplitude(samples);
    if peak < MIN_NORMALIZE_PEAK {
        return;
    }

    let gain = ceiling / peak;
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-ceiling, ceiling);
    }
}

/// Decode little-endian signed 16-bit PCM into floats.
pub fn decode_pcm_s16le(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() % 2 != 0 {
        return Err(format!(
            "PCM payload has odd length {} (expected 16-bit samples)",
            bytes.len()
        ));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_length() {
        let clip = AudioClip::silence(0.5, 24000);
        assert_eq!(clip.len(), 12000);
        assert!(clip.samples.iter().all(|&s| s == 0.0));
        assert_eq!(AudioClip::silence(0.0, 24000).len(), 0);
    }

    fn tone(hz: f32, amplitude: f32, seconds: f32, rate: u32) -> Vec<f32> {
        let len = silence_samples(seconds, rate);
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * hz * i as f32 / rate as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16000, 16000).unwrap(), input);
        assert!(resample(&[], 16000, 24000).unwrap().is_empty());
    }

    #[test]
    fn test_resample_preserves_duration() {
        let output = resample(&vec![0.0f32; 16000], 16000, 24000).unwrap();
        assert_eq!(output.len(), 24000);

        let output = resample(&vec![0.0f32; 44100], 44100, 22050).unwrap();
        assert_eq!(output.len(), 22050);

        // Odd lengths round to the nearest whole sample.
        let output = resample(&vec![0.0f32; 1001], 44100, 24000).unwrap();
        assert_eq!(output.len(), resampled_len(1001, 44100, 24000));
        assert_eq!(output.len(), 545);
    }

    #[test]
    fn test_resample_keeps_passband_level() {
        let input = tone(440.0, 0.5, 1.0, 16000);
        let output = resample(&input, 16000, 24000).unwrap();

        // Skip the edges, where the filter ramps in and out.
        let middle = &output[2400..21600];
        assert!((rms(middle) - rms(&input[1600..14400])).abs() < 0.02);
    }

    #[test]
    fn test_downsampling_filters_above_nyquist() {
        // 10 kHz cannot be represented at 16 kHz and must not fold back.
        let input = tone(10_000.0, 1.0, 1.0, 44100);
        let output = resample(&input, 44100, 16000).unwrap();

        assert_eq!(output.len(), 16000);
        assert!(rms(&output[1600..14400]) < 0.1);
    }

    #[test]
    fn test_resample_is_deterministic() {
        let input = tone(300.0, 0.4, 0.25, 44100);
        assert_eq!(
            resample(&input, 44100, 24000).unwrap(),
            resample(&input, 44100, 24000).unwrap()
        );
    }

    #[test]
    fn test_clip_resampled_changes_rate() {
        let clip = AudioClip::new(vec![0.25; 800], 8000).resampled(16000).unwrap();
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.len(), 1600);
    }

    #[test]
    fn test_normalize_hits_ceiling() {
        let mut samples = vec![0.1, -0.4, 0.2];
        normalize_peak(&mut samples, 0.95);
        assert!((peak_amplitude(&samples) - 0.95).abs() < 1e-6);
        assert!(samples[1] < 0.0);
    }

    #[test]
    fn test_normalize_leaves_silence_alone() {
        let mut samples = vec![0.0; 10];
        normalize_peak(&mut samples, 0.95);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_decode_pcm() {
        let bytes = [0x00, 0x40, 0x00, 0xC0];
        let samples = decode_pcm_s16le(&bytes).unwrap();
        assert_eq!(samples, vec![0.5, -0.5]);
        assert!(decode_pcm_s16le(&[0x00]).is_err());
    }
}
