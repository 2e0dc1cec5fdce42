//! Autocorrelation pitch analysis.
//!
//! ## Per frame
//!
//! 1. Remove DC, compute RMS and peak amplitude.
//! 2. Normalized autocorrelation over the lag range for the F0 search band.
//! 3. Best peak above the clarity threshold → voiced, F0 = rate / lag
//!    (with parabolic lag refinement).
//!
//! Clarity (the normalized peak height) doubles as the harmonicity estimate:
//! `HNR = 10·log10(r / (1 - r))`.

/// F0 search and voicing parameters.
#[derive(Debug, Clone)]
pub struct PitchConfig {
    /// Lower bound of the F0 search range (Hz).
    pub min_f0: f64,
    /// Upper bound of the F0 search range (Hz).
    pub max_f0: f64,
    /// Minimum normalized autocorrelation peak for a frame to count as voiced.
    pub clarity_threshold: f64,
    /// Minimum frame RMS for a frame to count as voiced.
    pub rms_threshold: f64,
}

impl PitchConfig {
    /// Spoken-voice search range (75–500 Hz).
    pub fn spoken() -> Self {
        Self {
            min_f0: 75.0,
            max_f0: 500.0,
            clarity_threshold: 0.40,
            rms_threshold: 0.01,
        }
    }

    /// Sung-voice search range (50–1000 Hz).
    pub fn sung() -> Self {
        Self {
            min_f0: 50.0,
            max_f0: 1000.0,
            clarity_threshold: 0.40,
            rms_threshold: 0.01,
        }
    }
}

/// Pitch measurement for one analysis frame.
#[derive(Debug, Clone, Copy)]
pub struct FramePitch {
    /// Fundamental frequency, `None` for unvoiced frames.
    pub f0: Option<f64>,
    /// Normalized autocorrelation peak in [0, 1] (0 when unvoiced/degenerate).
    pub clarity: f64,
    /// Frame RMS.
    pub rms: f64,
    /// Frame peak amplitude.
    pub peak: f64,
}

impl FramePitch {
    pub fn is_voiced(&self) -> bool {
        self.f0.is_some()
    }

    /// Harmonics-to-noise ratio in dB from the autocorrelation peak.
    /// `None` for unvoiced frames.
    pub fn hnr_db(&self) -> Option<f64> {
        self.f0?;
        let r = self.clarity.clamp(1e-6, 1.0 - 1e-6);
        Some(10.0 * (r / (1.0 - r)).log10())
    }
}

/// Analyze one frame. `frame` should be ≥ 2 periods of `min_f0` long for a
/// reliable peak (the feature extractor uses 40 ms frames).
pub fn analyze_frame(frame: &[f32], sample_rate: u32, cfg: &PitchConfig) -> FramePitch {
    let n = frame.len();
    let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / n.max(1) as f64;

    let mut energy = 0.0f64;
    let mut peak = 0.0f64;
    let centered: Vec<f64> = frame
        .iter()
        .map(|&s| {
            let v = s as f64 - mean;
            energy += v * v;
            peak = peak.max(v.abs());
            v
        })
        .collect();

    let rms = if n == 0 { 0.0 } else { (energy / n as f64).sqrt() };

    let unvoiced = FramePitch {
        f0: None,
        clarity: 0.0,
        rms,
        peak,
    };

    if rms < cfg.rms_threshold || energy <= 0.0 {
        return unvoiced;
    }

    let min_lag = (sample_rate as f64 / cfg.max_f0).floor() as usize;
    let max_lag = (sample_rate as f64 / cfg.min_f0).ceil() as usize;
    if max_lag + 1 >= n || min_lag < 2 {
        return unvoiced;
    }

    // Normalized autocorrelation: r(τ) = Σ x[i]·x[i+τ] / √(Σx[i]² · Σx[i+τ]²)
    let mut correlations = vec![0.0f64; max_lag + 1];
    let mut best_r = 0.0f64;
    for lag in min_lag..=max_lag {
        let m = n - lag;
        let mut dot = 0.0f64;
        let mut e0 = 0.0f64;
        let mut e1 = 0.0f64;
        for i in 0..m {
            dot += centered[i] * centered[i + lag];
            e0 += centered[i] * centered[i];
            e1 += centered[i + lag] * centered[i + lag];
        }
        let denom = (e0 * e1).sqrt();
        if denom <= 0.0 {
            continue;
        }
        let r = dot / denom;
        correlations[lag] = r;
        best_r = best_r.max(r);
    }

    // Smallest lag within tolerance of the best peak. A strongly periodic
    // signal correlates almost as well at 2T as at T; taking the raw maximum
    // would halve the pitch on such frames.
    let best_lag = (min_lag..=max_lag)
        .find(|&lag| correlations[lag] >= best_r - 0.01)
        .unwrap_or(0);

    if best_lag == 0 || best_r < cfg.clarity_threshold {
        return FramePitch {
            f0: None,
            clarity: best_r.max(0.0),
            rms,
            peak,
        };
    }

    let refined = refine_lag(&centered, best_lag, min_lag, max_lag);
    let f0 = sample_rate as f64 / refined;
    if !f0.is_finite() || f0 < cfg.min_f0 || f0 > cfg.max_f0 {
        return unvoiced;
    }

    FramePitch {
        f0: Some(f0),
        clarity: best_r,
        rms,
        peak,
    }
}

/// Parabolic interpolation of the autocorrelation peak around `lag`.
fn refine_lag(x: &[f64], lag: usize, min_lag: usize, max_lag: usize) -> f64 {
    if lag <= min_lag || lag + 1 > max_lag {
        return lag as f64;
    }
    let raw = |l: usize| -> f64 {
        let m = x.len() - l;
        (0..m).map(|i| x[i] * x[i + l]).sum()
    };
    let (ym1, y0, yp1) = (raw(lag - 1), raw(lag), raw(lag + 1));
    let denom = ym1 - 2.0 * y0 + yp1;
    if denom.abs() < 1e-12 {
        return lag as f64;
    }
    let delta = 0.5 * (ym1 - yp1) / denom;
    lag as f64 + delta.clamp(-1.0, 1.0)
}

/// Mean / min / max F0 over the voiced frames. `None` when nothing is voiced.
pub fn f0_stats(frames: &[FramePitch]) -> Option<(f64, f64, f64)> {
    let voiced: Vec<f64> = frames
        .iter()
        .filter_map(|f| f.f0)
        .filter(|v| v.is_finite())
        .collect();
    if voiced.is_empty() {
        return None;
    }
    let mean = voiced.iter().sum::<f64>() / voiced.len() as f64;
    let min = voiced.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = voiced.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some((mean, min, max))
}

/// Frame-to-frame period perturbation in percent over consecutive voiced
/// frames (local jitter approximation). `None` with fewer than 2 voiced pairs.
pub fn jitter_percent(frames: &[FramePitch]) -> Option<f64> {
    let periods: Vec<f64> = consecutive_voiced(frames, |f| f.f0.map(|v| 1.0 / v));
    perturbation_percent(&periods)
}

/// Frame-to-frame amplitude perturbation in percent over consecutive voiced
/// frames (local shimmer approximation).
pub fn shimmer_percent(frames: &[FramePitch]) -> Option<f64> {
    let peaks: Vec<f64> = consecutive_voiced(frames, |f| f.f0.map(|_| f.peak));
    perturbation_percent(&peaks)
}

/// Fraction of frames classified voiced.
pub fn voiced_ratio(frames: &[FramePitch]) -> f64 {
    if frames.is_empty() {
        return 0.0;
    }
    frames.iter().filter(|f| f.is_voiced()).count() as f64 / frames.len() as f64
}

fn consecutive_voiced(frames: &[FramePitch], f: impl Fn(&FramePitch) -> Option<f64>) -> Vec<f64> {
    // Runs of voiced frames only — perturbation across an unvoiced gap is
    // meaningless and would inflate the measure.
    let mut out = Vec::new();
    let mut run: Vec<f64> = Vec::new();
    for frame in frames {
        match f(frame) {
            Some(v) if v.is_finite() => run.push(v),
            _ => {
                if run.len() >= 2 {
                    out.extend(run.iter());
                    out.push(f64::NAN); // run separator
                }
                run.clear();
            }
        }
    }
    if run.len() >= 2 {
        out.extend(run.iter());
        out.push(f64::NAN);
    }
    out
}

fn perturbation_percent(values: &[f64]) -> Option<f64> {
    let mut diffs = Vec::new();
    let mut mags = Vec::new();
    let mut prev: Option<f64> = None;
    for &v in values {
        if v.is_nan() {
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            diffs.push((v - p).abs());
        }
        mags.push(v);
        prev = Some(v);
    }
    if diffs.is_empty() || mags.is_empty() {
        return None;
    }
    let mean_mag = mags.iter().sum::<f64>() / mags.len() as f64;
    if mean_mag <= 0.0 {
        return None;
    }
    let mean_diff = diffs.iter().sum::<f64>() / diffs.len() as f64;
    Some(mean_diff / mean_mag * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_frame(freq: f64, sample_rate: u32, len: usize, amplitude: f64) -> Vec<f32> {
        (0..len)
            .map(|i| {
                (amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64)
                    .sin()) as f32
            })
            .collect()
    }

    #[test]
    fn tone_pitch_detected() {
        let frame = sine_frame(220.0, 16_000, 640, 0.4);
        let p = analyze_frame(&frame, 16_000, &PitchConfig::spoken());
        let f0 = p.f0.expect("tone should be voiced");
        assert!((f0 - 220.0).abs() < 5.0, "f0={f0}");
        assert!(p.clarity > 0.9);
    }

    #[test]
    fn silence_is_unvoiced() {
        let frame = vec![0.0f32; 640];
        let p = analyze_frame(&frame, 16_000, &PitchConfig::spoken());
        assert!(!p.is_voiced());
        assert_eq!(p.rms, 0.0);
    }

    #[test]
    fn noise_has_low_clarity() {
        // Deterministic pseudo-noise (LCG) — no harmonic structure.
        let mut state = 0x2545F491u64;
        let frame: Vec<f32> = (0..640)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 30) as f64 - 1.0) as f32 * 0.3
            })
            .collect();
        let p = analyze_frame(&frame, 16_000, &PitchConfig::spoken());
        assert!(
            p.clarity < 0.6,
            "noise clarity should be low, got {}",
            p.clarity
        );
    }

    #[test]
    fn hnr_grows_with_clarity() {
        let strong = FramePitch {
            f0: Some(200.0),
            clarity: 0.99,
            rms: 0.1,
            peak: 0.2,
        };
        let weak = FramePitch {
            f0: Some(200.0),
            clarity: 0.6,
            rms: 0.1,
            peak: 0.2,
        };
        assert!(strong.hnr_db().unwrap() > weak.hnr_db().unwrap());
    }

    #[test]
    fn f0_stats_over_mixed_frames() {
        let frames = vec![
            FramePitch {
                f0: Some(200.0),
                clarity: 0.9,
                rms: 0.1,
                peak: 0.2,
            },
            FramePitch {
                f0: None,
                clarity: 0.0,
                rms: 0.0,
                peak: 0.0,
            },
            FramePitch {
                f0: Some(240.0),
                clarity: 0.9,
                rms: 0.1,
                peak: 0.2,
            },
        ];
        let (mean, min, max) = f0_stats(&frames).unwrap();
        assert_eq!(min, 200.0);
        assert_eq!(max, 240.0);
        assert!((mean - 220.0).abs() < 1e-9);
    }

    #[test]
    fn f0_stats_none_when_unvoiced() {
        let frames = vec![FramePitch {
            f0: None,
            clarity: 0.0,
            rms: 0.0,
            peak: 0.0,
        }];
        assert!(f0_stats(&frames).is_none());
    }

    #[test]
    fn steady_tone_has_near_zero_jitter() {
        let frames: Vec<FramePitch> = (0..20)
            .map(|_| FramePitch {
                f0: Some(200.0),
                clarity: 0.95,
                rms: 0.1,
                peak: 0.2,
            })
            .collect();
        let jitter = jitter_percent(&frames).unwrap();
        assert!(jitter < 1e-9, "jitter={jitter}");
    }

    #[test]
    fn wobbly_pitch_has_jitter() {
        let frames: Vec<FramePitch> = (0..20)
            .map(|i| FramePitch {
                f0: Some(if i % 2 == 0 { 195.0 } else { 205.0 }),
                clarity: 0.9,
                rms: 0.1,
                peak: if i % 2 == 0 { 0.18 } else { 0.22 },
            })
            .collect();
        assert!(jitter_percent(&frames).unwrap() > 1.0);
        assert!(shimmer_percent(&frames).unwrap() > 5.0);
    }
}
