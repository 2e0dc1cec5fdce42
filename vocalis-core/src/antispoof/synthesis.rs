//! AI-generation detection from source smoothness.
//!
//! Human phonation carries irreducible cycle-to-cycle perturbation. A voiced
//! signal whose pitch and amplitude tracks are essentially perfectly smooth
//! is either heavily processed or synthesized — either way not acceptable as
//! verification evidence.

use super::{SpoofCheck, SpoofCheckKind};
use crate::audio::AudioSample;
use crate::cancel::CancelFlag;
use crate::dsp::{self, pitch};
use crate::error::Result;

const FRAME_LEN: usize = 640;
const HOP: usize = 160;
const CANCEL_CHECK_FRAMES: usize = 128;

#[derive(Debug, Clone)]
pub struct SynthesisDetector {
    /// Jitter below this (percent) reads as unnaturally smooth.
    /// Default: 0.02.
    pub min_natural_jitter: f64,
    /// Shimmer below this (percent) reads as unnaturally smooth.
    /// Default: 0.5.
    pub min_natural_shimmer: f64,
    /// Minimum voiced fraction for the smoothness evidence to be meaningful.
    /// Default: 0.5.
    pub min_voiced_ratio: f64,
}

impl Default for SynthesisDetector {
    fn default() -> Self {
        Self {
            min_natural_jitter: 0.02,
            min_natural_shimmer: 0.5,
            min_voiced_ratio: 0.5,
        }
    }
}

impl SpoofCheck for SynthesisDetector {
    fn kind(&self) -> SpoofCheckKind {
        SpoofCheckKind::Synthesis
    }

    fn name(&self) -> &'static str {
        "synthesis"
    }

    fn evaluate(&self, sample: &AudioSample, cancel: &CancelFlag) -> Result<bool> {
        let frames = pitch_track(sample, cancel)?;
        if frames.is_empty() {
            return Ok(false);
        }

        let voiced_ratio = pitch::voiced_ratio(&frames);
        if voiced_ratio < self.min_voiced_ratio {
            // Mostly unvoiced audio carries no usable smoothness evidence.
            return Ok(false);
        }

        let (Some(jitter), Some(shimmer)) = (
            pitch::jitter_percent(&frames),
            pitch::shimmer_percent(&frames),
        ) else {
            return Ok(false);
        };

        Ok(jitter < self.min_natural_jitter && shimmer < self.min_natural_shimmer)
    }
}

/// Wide-range pitch track shared by the smoothness heuristics.
pub(crate) fn pitch_track(
    sample: &AudioSample,
    cancel: &CancelFlag,
) -> Result<Vec<pitch::FramePitch>> {
    let samples = &sample.samples;
    let n_frames = dsp::frame_count(samples.len(), FRAME_LEN, HOP);
    // Wide band covering spoken and sung voices.
    let cfg = pitch::PitchConfig {
        min_f0: 60.0,
        max_f0: 800.0,
        clarity_threshold: 0.40,
        rms_threshold: 0.01,
    };

    let mut frames = Vec::with_capacity(n_frames);
    for i in 0..n_frames {
        if i % CANCEL_CHECK_FRAMES == 0 {
            cancel.check()?;
        }
        frames.push(pitch::analyze_frame(
            &samples[i * HOP..i * HOP + FRAME_LEN],
            sample.sample_rate,
            &cfg,
        ));
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antispoof::test_signals::{humanized_voice, perfectly_smooth_voice};

    #[test]
    fn perfectly_smooth_voice_flags_synthesis() {
        let detector = SynthesisDetector::default();
        let verdict = detector
            .evaluate(&perfectly_smooth_voice(2.0), &CancelFlag::new())
            .unwrap();
        assert!(verdict, "zero-perturbation voice should read as synthetic");
    }

    #[test]
    fn humanized_voice_passes() {
        let detector = SynthesisDetector::default();
        let verdict = detector
            .evaluate(&humanized_voice(2.0), &CancelFlag::new())
            .unwrap();
        assert!(!verdict, "perturbed voice should not read as synthetic");
    }

    #[test]
    fn silence_passes_quietly() {
        let detector = SynthesisDetector::default();
        let sample = AudioSample::new(vec![0.0f32; 16_000], 16_000, 1);
        assert!(!detector.evaluate(&sample, &CancelFlag::new()).unwrap());
    }
}
