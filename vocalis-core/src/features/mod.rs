//! Acoustic feature extraction.
//!
//! ## Per-frame measures and their aggregation
//!
//! | Measure | Frames | Aggregate |
//! |---------|--------|-----------|
//! | Spectral centroid / rolloff / ring band | all | mean |
//! | MFCCs (13) | all | per-coefficient mean |
//! | HNR, CPP, H1-H2 | voiced | mean |
//! | F0 mean/range, jitter, shimmer | voiced | pitch-track stats |
//! | Formants F1-F4 (LPC roots) | voiced | per-slot mean |
//!
//! Degenerate per-frame values (NaN, Inf, silent frames) are excluded from
//! aggregation. If exclusion leaves zero usable frames the extraction fails
//! with `InsufficientAudio` — a feature record of fabricated zeros is never
//! produced.

use tracing::debug;

use crate::api::{AudioType, FeaturesPayload, FormantsPayload};
use crate::audio::AudioSample;
use crate::cancel::CancelFlag;
use crate::dsp::{self, cepstrum, lpc, pitch, spectral, SpectrumAnalyzer};
use crate::error::{Result, VocalisError};

/// Spectral analysis window: 25 ms at 16 kHz.
const SPECTRAL_FRAME_LEN: usize = 400;
/// Pitch analysis window: 40 ms at 16 kHz (≥ 2 periods of the lowest F0).
const PITCH_FRAME_LEN: usize = 640;
/// Hop: 10 ms at 16 kHz.
const HOP: usize = 160;
/// Zero-padded FFT size (7.8 Hz bins — fine enough to read harmonics).
const FFT_SIZE: usize = 2048;
/// Mel bands and coefficients for the reported MFCCs.
const N_MELS: usize = 26;
const N_MFCC: usize = 13;
/// LPC order at 16 kHz.
const LPC_ORDER: usize = 14;
/// Neutral formant slots for frames/voices where LPC found nothing usable.
const FORMANT_DEFAULTS: [f64; 4] = [500.0, 1500.0, 2500.0, 3500.0];
/// Singer's-formant band (Hz).
const RING_BAND: (f64, f64) = (2_500.0, 3_500.0);
/// Cancellation poll interval, in frames.
const CANCEL_CHECK_FRAMES: usize = 128;

/// Aggregated acoustic features for one sample. Immutable once computed.
///
/// `None` means "not measurable for this input" (e.g. harmonic measures on
/// unvoiced audio); the wire layer serializes it as `null`.
#[derive(Debug, Clone)]
pub struct AcousticFeatures {
    pub spectral_centroid: f64,
    pub spectral_rolloff: Option<f64>,
    pub hnr: Option<f64>,
    pub cpp: Option<f64>,
    pub h1_h2: Option<f64>,
    pub f0_mean: Option<f64>,
    pub f0_range: Option<[f64; 2]>,
    pub formants: [f64; 4],
    pub mfccs: Option<Vec<f64>>,
    pub jitter: Option<f64>,
    pub shimmer: Option<f64>,
    /// Energy fraction in the 2.5-3.5 kHz singer's-formant band.
    pub ring_energy_ratio: f64,
    /// Fraction of frames classified voiced.
    pub voiced_ratio: f64,
}

impl AcousticFeatures {
    /// Convert to the wire shape.
    pub fn to_payload(&self) -> FeaturesPayload {
        FeaturesPayload {
            spectral_centroid: self.spectral_centroid,
            spectral_rolloff: self.spectral_rolloff,
            hnr: self.hnr,
            cpp: self.cpp,
            h1_h2: self.h1_h2,
            f0_mean: self.f0_mean,
            f0_range: self.f0_range,
            formants: FormantsPayload {
                f1: self.formants[0],
                f2: self.formants[1],
                f3: self.formants[2],
                f4: self.formants[3],
            },
            mfccs: self.mfccs.clone(),
            jitter: self.jitter,
            shimmer: self.shimmer,
        }
    }
}

/// Extract aggregated acoustic features from a normalized sample.
///
/// Pure with respect to its inputs: the same sample and audio type always
/// produce the same features.
///
/// # Errors
/// - `VocalisError::InsufficientAudio` when no analyzable frames remain.
/// - `VocalisError::Cancelled` when the request was abandoned.
pub fn extract(
    sample: &AudioSample,
    audio_type: AudioType,
    cancel: &CancelFlag,
) -> Result<AcousticFeatures> {
    let samples = &sample.samples;
    let rate = sample.sample_rate;

    let n_frames = dsp::frame_count(samples.len(), PITCH_FRAME_LEN, HOP);
    if n_frames == 0 {
        return Err(VocalisError::InsufficientAudio {
            detail: "audio shorter than one analysis frame".into(),
        });
    }

    let pitch_cfg = match audio_type {
        AudioType::Spoken => pitch::PitchConfig::spoken(),
        AudioType::Sung => pitch::PitchConfig::sung(),
    };
    let analyzer = SpectrumAnalyzer::new(rate, SPECTRAL_FRAME_LEN, FFT_SIZE);
    let filterbank = cepstrum::mel_filterbank(N_MELS, FFT_SIZE, rate, 0.0, rate as f64 / 2.0);
    let bin_hz = analyzer.bin_hz();

    let mut pitch_frames = Vec::with_capacity(n_frames);
    let mut centroids = Vec::new();
    let mut rolloffs = Vec::new();
    let mut ring_ratios = Vec::new();
    let mut mfcc_frames: Vec<Vec<f64>> = Vec::new();
    let mut hnrs = Vec::new();
    let mut cpps = Vec::new();
    let mut h1_h2s = Vec::new();
    let mut formant_frames: Vec<Vec<f64>> = Vec::new();

    for i in 0..n_frames {
        if i % CANCEL_CHECK_FRAMES == 0 {
            cancel.check()?;
        }
        let start = i * HOP;
        let pitch_frame = &samples[start..start + PITCH_FRAME_LEN];
        let spectral_frame = &samples[start..start + SPECTRAL_FRAME_LEN];

        let fp = pitch::analyze_frame(pitch_frame, rate, &pitch_cfg);

        let power = analyzer.power_spectrum(spectral_frame);
        if let Some(c) = spectral::centroid_hz(&power, bin_hz) {
            centroids.push(c);
            if let Some(r) = spectral::rolloff_hz(&power, bin_hz, 0.85) {
                rolloffs.push(r);
            }
            ring_ratios.push(spectral::band_energy_ratio(
                &power, bin_hz, RING_BAND.0, RING_BAND.1,
            ));
            mfcc_frames.push(cepstrum::mfcc(&power, &filterbank, N_MFCC));
        }

        if let Some(f0) = fp.f0 {
            if let Some(h) = fp.hnr_db() {
                hnrs.push(h);
            }
            if let Some(c) =
                cepstrum::cpp_db(&analyzer, &power, pitch_cfg.min_f0, pitch_cfg.max_f0)
            {
                cpps.push(c);
            }
            if let Some(h) = spectral::h1_h2_db(&power, bin_hz, f0) {
                h1_h2s.push(h);
            }
            let formants = lpc::formants_from_frame(pitch_frame, rate, LPC_ORDER, 4);
            if !formants.is_empty() {
                formant_frames.push(formants);
            }
        }

        pitch_frames.push(fp);
    }

    let Some(spectral_centroid) = mean_finite(&centroids) else {
        return Err(VocalisError::InsufficientAudio {
            detail: "all frames were silent or degenerate".into(),
        });
    };

    let (f0_mean, f0_range) = match pitch::f0_stats(&pitch_frames) {
        Some((mean, min, max)) => (Some(mean), Some([min, max])),
        None => (None, None),
    };

    let mut formants = FORMANT_DEFAULTS;
    for (slot, default) in formants.iter_mut().enumerate() {
        let values: Vec<f64> = formant_frames
            .iter()
            .filter_map(|f| f.get(slot).copied())
            .collect();
        if let Some(mean) = mean_finite(&values) {
            *default = mean;
        }
    }

    let mfccs = if mfcc_frames.is_empty() {
        None
    } else {
        let mut means = vec![0.0f64; N_MFCC];
        for frame in &mfcc_frames {
            for (m, &c) in frame.iter().enumerate() {
                means[m] += c;
            }
        }
        for m in means.iter_mut() {
            *m /= mfcc_frames.len() as f64;
        }
        Some(means)
    };

    let features = AcousticFeatures {
        spectral_centroid,
        spectral_rolloff: mean_finite(&rolloffs),
        hnr: mean_finite(&hnrs),
        cpp: mean_finite(&cpps),
        h1_h2: mean_finite(&h1_h2s),
        f0_mean,
        f0_range,
        formants,
        mfccs,
        jitter: pitch::jitter_percent(&pitch_frames),
        shimmer: pitch::shimmer_percent(&pitch_frames),
        ring_energy_ratio: mean_finite(&ring_ratios).unwrap_or(0.0),
        voiced_ratio: pitch::voiced_ratio(&pitch_frames),
    };

    debug!(
        frames = n_frames,
        voiced = pitch_frames.iter().filter(|f| f.is_voiced()).count(),
        centroid = features.spectral_centroid,
        "feature extraction complete"
    );

    Ok(features)
}

/// Mean over the finite entries; `None` when none remain.
fn mean_finite(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().sum::<f64>() / finite.len() as f64)
}
