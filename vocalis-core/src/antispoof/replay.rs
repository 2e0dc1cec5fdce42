//! Replay detection from channel artifacts.
//!
//! A re-recorded sample passes through a loudspeaker, a room and a second
//! microphone — or a lossy re-encode — before reaching us. Both leave the
//! same fingerprint at 16 kHz: the band above ~4 kHz is nearly empty and the
//! spectrum falls off a cliff well below Nyquist. Live close-mic speech keeps
//! measurable consonant/sibilant energy up there.

use super::{SpoofCheck, SpoofCheckKind};
use crate::audio::AudioSample;
use crate::cancel::CancelFlag;
use crate::dsp::{self, spectral, SpectrumAnalyzer};
use crate::error::Result;

const FRAME_LEN: usize = 400;
const HOP: usize = 160;
const FFT_SIZE: usize = 1024;
const CANCEL_CHECK_FRAMES: usize = 256;

/// Band expected to carry live-capture energy (Hz).
const HIGH_BAND: (f64, f64) = (4_000.0, 7_000.0);

#[derive(Debug, Clone)]
pub struct ReplayDetector {
    /// Mean high-band energy fraction below which the channel looks dead.
    /// Default: 1e-3.
    pub high_band_floor: f64,
    /// 99%-energy rolloff below this frequency marks a band-limited
    /// re-encode (Hz). Default: 4500.
    pub cutoff_hz: f64,
}

impl Default for ReplayDetector {
    fn default() -> Self {
        Self {
            high_band_floor: 1e-3,
            cutoff_hz: 4_500.0,
        }
    }
}

impl SpoofCheck for ReplayDetector {
    fn kind(&self) -> SpoofCheckKind {
        SpoofCheckKind::Replay
    }

    fn name(&self) -> &'static str {
        "replay"
    }

    fn evaluate(&self, sample: &AudioSample, cancel: &CancelFlag) -> Result<bool> {
        let samples = &sample.samples;
        let n_frames = dsp::frame_count(samples.len(), FRAME_LEN, HOP);
        if n_frames == 0 {
            return Ok(false);
        }

        let analyzer = SpectrumAnalyzer::new(sample.sample_rate, FRAME_LEN, FFT_SIZE);
        let bin_hz = analyzer.bin_hz();

        let mut high_fractions = Vec::with_capacity(n_frames);
        let mut rolloffs = Vec::with_capacity(n_frames);
        for i in 0..n_frames {
            if i % CANCEL_CHECK_FRAMES == 0 {
                cancel.check()?;
            }
            let power = analyzer.power_spectrum(&samples[i * HOP..i * HOP + FRAME_LEN]);
            high_fractions.push(spectral::band_energy_ratio(
                &power, bin_hz, HIGH_BAND.0, HIGH_BAND.1,
            ));
            if let Some(r) = spectral::rolloff_hz(&power, bin_hz, 0.99) {
                rolloffs.push(r);
            }
        }

        let mean_high =
            high_fractions.iter().sum::<f64>() / high_fractions.len() as f64;
        let mean_rolloff = if rolloffs.is_empty() {
            0.0
        } else {
            rolloffs.iter().sum::<f64>() / rolloffs.len() as f64
        };

        // Both fingerprints must agree before flagging fraud.
        Ok(mean_high < self.high_band_floor && mean_rolloff < self.cutoff_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Band-limited "replayed" audio: harmonics confined below 2 kHz.
    fn replayed_sample() -> AudioSample {
        let rate = 16_000u32;
        let samples: Vec<f32> = (0..2 * rate as usize)
            .map(|i| {
                let t = i as f64 / rate as f64;
                let mut v = 0.0;
                for h in 1..=10 {
                    v += (2.0 * std::f64::consts::PI * 180.0 * h as f64 * t).sin() / h as f64;
                }
                (0.2 * v) as f32
            })
            .collect();
        AudioSample::new(samples, rate, 1)
    }

    /// Broadband "live" audio: pulse excitation keeps energy up to Nyquist.
    fn live_sample() -> AudioSample {
        let rate = 16_000u32;
        let period = (rate / 180) as usize;
        let samples: Vec<f32> = (0..2 * rate as usize)
            .map(|i| if i % period == 0 { 0.5 } else { 0.01 })
            .collect();
        AudioSample::new(samples, rate, 1)
    }

    #[test]
    fn band_limited_audio_flags_replay() {
        let detector = ReplayDetector::default();
        let verdict = detector
            .evaluate(&replayed_sample(), &CancelFlag::new())
            .unwrap();
        assert!(verdict, "band-limited audio should read as replay");
    }

    #[test]
    fn broadband_audio_passes() {
        let detector = ReplayDetector::default();
        let verdict = detector
            .evaluate(&live_sample(), &CancelFlag::new())
            .unwrap();
        assert!(!verdict, "broadband audio should not read as replay");
    }

    #[test]
    fn empty_audio_passes_quietly() {
        let detector = ReplayDetector::default();
        let sample = AudioSample::new(vec![0.0f32; 100], 16_000, 1);
        assert!(!detector.evaluate(&sample, &CancelFlag::new()).unwrap());
    }
}
