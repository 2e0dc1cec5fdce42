//! `SpectralEmbedder` — deterministic DSP-statistics embedding backend.
//!
//! Per frame: 40 spectral-shape MFCCs (C1-C40 from a 41-band mel filterbank;
//! C0 is discarded as common-mode loudness) plus a 12-bin chroma profile.
//! The embedding is the concatenation of per-coefficient means,
//! per-coefficient standard deviations and the chroma mean, zero-padded to
//! the configured dimension and L2-normalized.
//!
//! Not a neural speaker model — it captures the spectral envelope statistics
//! that distinguish voices well enough for cooperative enrollment, and it is
//! exactly reproducible, which the verification tests depend on.

use ndarray::{Array2, Axis};
use tracing::debug;

use super::{l2_normalize, EmbeddingModel, DEFAULT_EMBEDDING_DIM};
use crate::audio::AudioSample;
use crate::cancel::CancelFlag;
use crate::dsp::{self, cepstrum, spectral, SpectrumAnalyzer};
use crate::error::{Result, VocalisError};

/// 25 ms / 10 ms framing at 16 kHz.
const FRAME_LEN: usize = 400;
const HOP: usize = 160;
const FFT_SIZE: usize = 512;
/// Mel bands == coefficients, per the statistics layout.
const N_MELS: usize = 40;
const N_CHROMA: usize = 12;
/// Cancellation poll interval, in frames.
const CANCEL_CHECK_FRAMES: usize = 256;

/// Default embedding backend.
#[derive(Debug, Clone)]
pub struct SpectralEmbedder {
    dimension: usize,
}

impl SpectralEmbedder {
    /// `dimension` must be ≥ the 92 informative statistics (40 + 40 + 12).
    pub fn new(dimension: usize) -> Self {
        debug_assert!(dimension >= 2 * N_MELS + N_CHROMA);
        Self { dimension }
    }
}

impl Default for SpectralEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl EmbeddingModel for SpectralEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, sample: &AudioSample, cancel: &CancelFlag) -> Result<Vec<f32>> {
        let samples = &sample.samples;
        let rate = sample.sample_rate;

        let n_frames = dsp::frame_count(samples.len(), FRAME_LEN, HOP);
        if n_frames == 0 {
            return Err(VocalisError::InsufficientAudio {
                detail: "audio shorter than one embedding frame".into(),
            });
        }

        let analyzer = SpectrumAnalyzer::new(rate, FRAME_LEN, FFT_SIZE);
        // One extra band so 40 shape coefficients remain after dropping C0.
        let filterbank =
            cepstrum::mel_filterbank(N_MELS + 1, FFT_SIZE, rate, 20.0, rate as f64 / 2.0 - 400.0);
        let bin_hz = analyzer.bin_hz();

        let mut mfcc_rows = Array2::<f64>::zeros((n_frames, N_MELS));
        let mut chroma_sum = [0.0f64; N_CHROMA];

        for i in 0..n_frames {
            if i % CANCEL_CHECK_FRAMES == 0 {
                cancel.check()?;
            }
            let frame = &samples[i * HOP..i * HOP + FRAME_LEN];
            let power = analyzer.power_spectrum(frame);

            // C0 is common-mode loudness after RMS normalization; it is
            // dropped so cosine distances measure spectral shape.
            let coeffs = cepstrum::mfcc(&power, &filterbank, N_MELS + 1);
            for (m, &c) in coeffs[1..].iter().enumerate() {
                mfcc_rows[[i, m]] = c;
            }

            let chroma = spectral::chroma_profile(&power, bin_hz);
            for (c, &v) in chroma.iter().enumerate() {
                chroma_sum[c] += v;
            }
        }

        let mean = mfcc_rows.mean_axis(Axis(0)).expect("n_frames > 0");
        let std = mfcc_rows.std_axis(Axis(0), 0.0);

        let mut vector = vec![0.0f32; self.dimension];
        for m in 0..N_MELS {
            vector[m] = mean[m] as f32;
            vector[N_MELS + m] = std[m] as f32;
        }
        for c in 0..N_CHROMA {
            vector[2 * N_MELS + c] = (chroma_sum[c] / n_frames as f64) as f32;
        }
        // Remaining dimensions stay zero — reserved for future statistics so
        // the wire dimensionality is stable across backend upgrades.

        l2_normalize(&mut vector);
        debug!(frames = n_frames, dim = self.dimension, "embedding extracted");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AudioType;
    use crate::embedding::EmbedderHandle;

    fn harmonic_sample(f0: f64, tilt: f64, secs: f64) -> AudioSample {
        let rate = 16_000u32;
        let n = (secs * rate as f64) as usize;
        let samples: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f64 / rate as f64;
                let mut v = 0.0;
                for h in 1..=12 {
                    let w = 2.0 * std::f64::consts::PI * f0 * h as f64 * t;
                    v += w.sin() / (h as f64).powf(tilt);
                }
                (0.15 * v) as f32
            })
            .collect();
        AudioSample::new(samples, rate, 1)
    }

    fn cosine(a: &[f32], b: &[f32]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| x as f64 * y as f64)
            .sum()
    }

    #[test]
    fn embedding_is_bit_identical_for_identical_input() {
        let embedder = SpectralEmbedder::default();
        let sample = harmonic_sample(180.0, 1.0, 2.0);
        let a = embedder.embed(&sample, &CancelFlag::new()).unwrap();
        let b = embedder.embed(&sample, &CancelFlag::new()).unwrap();
        assert_eq!(a, b, "embedding must be deterministic");
    }

    #[test]
    fn embedding_has_fixed_dimension_and_unit_norm() {
        let embedder = SpectralEmbedder::default();
        for secs in [1.0, 2.5, 4.0] {
            let v = embedder
                .embed(&harmonic_sample(160.0, 1.0, secs), &CancelFlag::new())
                .unwrap();
            assert_eq!(v.len(), DEFAULT_EMBEDDING_DIM);
            let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "norm={norm}");
        }
    }

    #[test]
    fn different_voices_separate_in_embedding_space() {
        let embedder = SpectralEmbedder::default();
        let low_dark = embedder
            .embed(&harmonic_sample(110.0, 1.6, 2.0), &CancelFlag::new())
            .unwrap();
        let high_bright = embedder
            .embed(&harmonic_sample(280.0, 0.6, 2.0), &CancelFlag::new())
            .unwrap();
        let same_again = embedder
            .embed(&harmonic_sample(110.0, 1.6, 2.0), &CancelFlag::new())
            .unwrap();

        let cross = cosine(&low_dark, &high_bright);
        let within = cosine(&low_dark, &same_again);
        assert!(
            within > cross + 0.05,
            "within={within:.4} should exceed cross={cross:.4}"
        );
    }

    #[test]
    fn too_short_audio_is_insufficient() {
        let embedder = SpectralEmbedder::default();
        let sample = AudioSample::new(vec![0.1f32; 100], 16_000, 1);
        let err = embedder.embed(&sample, &CancelFlag::new()).unwrap_err();
        assert_eq!(err.kind(), "insufficient_audio");
    }

    #[test]
    fn cancel_aborts_extraction() {
        let embedder = SpectralEmbedder::default();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = embedder
            .embed(&harmonic_sample(160.0, 1.0, 1.0), &cancel)
            .unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }

    #[test]
    fn handle_attaches_mode_and_quality() {
        let handle = EmbedderHandle::new(SpectralEmbedder::default());
        let emb = handle
            .extract(
                &harmonic_sample(200.0, 1.0, 3.0),
                AudioType::Sung,
                &CancelFlag::new(),
            )
            .unwrap();
        assert_eq!(emb.mode, AudioType::Sung);
        assert!(emb.quality > 0.0 && emb.quality <= 100.0);
    }
}
