//! Waveform ingest & normalization.
//!
//! ## Pipeline (per uploaded sample)
//!
//! ```text
//! encoded bytes + MIME → decode → mono mixdown → resample to engine rate
//!                      → silence trim (leading/trailing) → RMS loudness normalize
//! ```
//!
//! The decoded PCM buffer lives only for the duration of the request that
//! produced it. `AudioSample` zeroes its buffer on drop and must never be
//! written to durable storage.

pub mod decode;
pub mod normalize;
pub mod resample;

use crate::error::{Result, VocalisError};
use tracing::debug;

/// A mono PCM buffer at a known sample rate, exclusively owned by one request.
///
/// The buffer is zeroed on drop so raw audio does not outlive the request in
/// reusable heap pages.
#[derive(Debug, Clone)]
pub struct AudioSample {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count of the source file before mixdown.
    pub source_channels: u16,
}

impl AudioSample {
    pub fn new(samples: Vec<f32>, sample_rate: u32, source_channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            source_channels,
        }
    }

    /// Duration of the buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Drop for AudioSample {
    fn drop(&mut self) {
        // Privacy invariant: raw audio never persists past the request.
        for s in self.samples.iter_mut() {
            *s = 0.0;
        }
    }
}

/// Ingest parameters. Embedded in the engine configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Engine analysis rate (Hz). Uploads at other rates are resampled.
    /// Default: 16000.
    pub target_sample_rate: u32,
    /// RMS threshold below which a 10 ms frame counts as silence during
    /// edge trimming. Default: 0.01.
    pub trim_threshold: f32,
    /// Audio kept before the first / after the last non-silent frame (ms).
    /// Default: 50.
    pub trim_margin_ms: u32,
    /// Loudness normalization target in dBFS RMS. Default: -23.0.
    pub target_rms_dbfs: f32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            trim_threshold: 0.01,
            trim_margin_ms: 50,
            target_rms_dbfs: -23.0,
        }
    }
}

/// Decode, resample, trim and loudness-normalize one uploaded sample.
///
/// # Errors
/// - `VocalisError::UnsupportedFormat` for unknown MIME types, undecodable
///   payloads, or zero-duration files.
/// - `VocalisError::InsufficientAudio` when less than `min_duration_secs` of
///   audio remains after silence trimming.
pub fn ingest(
    bytes: &[u8],
    mime: &str,
    cfg: &IngestConfig,
    min_duration_secs: f32,
) -> Result<AudioSample> {
    let decoded = decode::decode(bytes, mime)?;

    let resampled = if decoded.sample_rate == cfg.target_sample_rate {
        decoded.samples
    } else {
        resample::resample_buffer(&decoded.samples, decoded.sample_rate, cfg.target_sample_rate)?
    };

    let trimmed = normalize::trim_silence(
        &resampled,
        cfg.target_sample_rate,
        cfg.trim_threshold,
        cfg.trim_margin_ms,
    );

    let min_samples = (min_duration_secs * cfg.target_sample_rate as f32) as usize;
    if trimmed.len() < min_samples {
        return Err(VocalisError::InsufficientAudio {
            detail: format!(
                "{:.2}s of voiced audio after trimming, need {:.2}s",
                trimmed.len() as f32 / cfg.target_sample_rate as f32,
                min_duration_secs
            ),
        });
    }

    let mut samples = trimmed.to_vec();
    normalize::normalize_rms(&mut samples, cfg.target_rms_dbfs);

    debug!(
        source_rate = decoded.sample_rate,
        source_channels = decoded.channels,
        trimmed_len = samples.len(),
        "ingest complete"
    );

    Ok(AudioSample::new(
        samples,
        cfg.target_sample_rate,
        decoded.channels,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::encode_wav_i16_mono;

    fn sine_bytes(freq: f64, secs: f32, rate: u32, amplitude: f64) -> Vec<u8> {
        let n = (secs * rate as f32) as usize;
        let samples: Vec<f32> = (0..n)
            .map(|i| {
                (amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / rate as f64).sin())
                    as f32
            })
            .collect();
        encode_wav_i16_mono(&samples, rate)
    }

    #[test]
    fn ingest_tone_succeeds() {
        let bytes = sine_bytes(220.0, 2.0, 44_100, 0.4);
        let cfg = IngestConfig::default();
        let sample = ingest(&bytes, "audio/wav", &cfg, 0.5).expect("ingest");
        assert_eq!(sample.sample_rate, 16_000);
        assert!(sample.duration_secs() > 1.5);
    }

    #[test]
    fn silence_only_is_insufficient() {
        let bytes = encode_wav_i16_mono(&vec![0.0f32; 32_000], 16_000);
        let cfg = IngestConfig::default();
        let err = ingest(&bytes, "audio/wav", &cfg, 0.5).unwrap_err();
        assert_eq!(err.kind(), "insufficient_audio");
    }

    #[test]
    fn unknown_mime_is_unsupported() {
        let err = ingest(&[0u8; 64], "video/mp4", &IngestConfig::default(), 0.5).unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");
    }

    #[test]
    fn leading_silence_is_trimmed() {
        let rate = 16_000u32;
        let mut samples = vec![0.0f32; rate as usize]; // 1 s of silence
        let tone: Vec<f32> = (0..rate as usize)
            .map(|i| {
                (0.4 * (2.0 * std::f64::consts::PI * 220.0 * i as f64 / rate as f64).sin()) as f32
            })
            .collect();
        samples.extend_from_slice(&tone);
        let bytes = encode_wav_i16_mono(&samples, rate);

        let sample = ingest(&bytes, "audio/wav", &IngestConfig::default(), 0.5).expect("ingest");
        // Trimming should have removed most of the leading second.
        assert!(
            sample.duration_secs() < 1.3,
            "expected ~1s after trim, got {:.2}s",
            sample.duration_secs()
        );
    }
}
