//! Liveness verification from natural micro-variation.
//!
//! The positive counterpart to the two fraud detectors: a live human
//! utterance shows cycle-to-cycle perturbation inside a characteristic band —
//! not absent (synthesis), not excessive (noise artifacts) — over a
//! meaningfully voiced signal.

use super::synthesis::pitch_track;
use super::{SpoofCheck, SpoofCheckKind};
use crate::audio::AudioSample;
use crate::cancel::CancelFlag;
use crate::dsp::pitch;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct LivenessCheck {
    /// Natural jitter band (percent). Default: 0.03 – 5.0.
    pub jitter_band: (f64, f64),
    /// Natural shimmer band (percent). Default: 0.3 – 15.0.
    pub shimmer_band: (f64, f64),
    /// Minimum voiced fraction for liveness evidence. Default: 0.2.
    pub min_voiced_ratio: f64,
}

impl Default for LivenessCheck {
    fn default() -> Self {
        Self {
            jitter_band: (0.03, 5.0),
            shimmer_band: (0.3, 15.0),
            min_voiced_ratio: 0.2,
        }
    }
}

impl SpoofCheck for LivenessCheck {
    fn kind(&self) -> SpoofCheckKind {
        SpoofCheckKind::Liveness
    }

    fn name(&self) -> &'static str {
        "liveness"
    }

    fn evaluate(&self, sample: &AudioSample, cancel: &CancelFlag) -> Result<bool> {
        let frames = pitch_track(sample, cancel)?;
        if frames.is_empty() {
            return Ok(false);
        }
        if pitch::voiced_ratio(&frames) < self.min_voiced_ratio {
            return Ok(false);
        }

        let (Some(jitter), Some(shimmer)) = (
            pitch::jitter_percent(&frames),
            pitch::shimmer_percent(&frames),
        ) else {
            return Ok(false);
        };

        let jitter_natural = jitter >= self.jitter_band.0 && jitter <= self.jitter_band.1;
        let shimmer_natural = shimmer >= self.shimmer_band.0 && shimmer <= self.shimmer_band.1;
        Ok(jitter_natural && shimmer_natural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antispoof::test_signals::{humanized_voice, perfectly_smooth_voice};

    #[test]
    fn humanized_voice_verifies_live() {
        let check = LivenessCheck::default();
        let verdict = check
            .evaluate(&humanized_voice(2.0), &CancelFlag::new())
            .unwrap();
        assert!(verdict, "natural perturbation should verify liveness");
    }

    #[test]
    fn smooth_voice_fails_liveness() {
        let check = LivenessCheck::default();
        let verdict = check
            .evaluate(&perfectly_smooth_voice(2.0), &CancelFlag::new())
            .unwrap();
        assert!(!verdict, "zero perturbation is not live evidence");
    }

    #[test]
    fn silence_fails_liveness() {
        let check = LivenessCheck::default();
        let sample = AudioSample::new(vec![0.0f32; 16_000], 16_000, 1);
        assert!(!check.evaluate(&sample, &CancelFlag::new()).unwrap());
    }
}
