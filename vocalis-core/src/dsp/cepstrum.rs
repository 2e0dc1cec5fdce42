//! Cepstral measures: CPP and MFCCs.

use super::SpectrumAnalyzer;

/// Cepstral Peak Prominence in dB.
///
/// Finds the cepstral peak inside the quefrency band corresponding to the
/// F0 search range, fits a least-squares regression line to the cepstrum over
/// that band, and reports the peak height above the line. Strongly periodic
/// voices produce a sharp rahmonic peak well above the regression trend.
pub fn cpp_db(
    analyzer: &SpectrumAnalyzer,
    power: &[f64],
    min_f0: f64,
    max_f0: f64,
) -> Option<f64> {
    if power.iter().all(|&p| p <= 0.0) {
        return None;
    }
    let ceps = analyzer.cepstrum_db(power);

    let sr = analyzer.sample_rate as f64;
    let q_lo = (sr / max_f0).floor() as usize;
    let q_hi = ((sr / min_f0).ceil() as usize).min(ceps.len() - 1);
    if q_lo < 2 || q_lo >= q_hi {
        return None;
    }

    let band = &ceps[q_lo..=q_hi];
    let (peak_idx, peak_val) = band
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())?;

    // Least-squares line over the quefrency band.
    let n = band.len() as f64;
    let sum_x: f64 = (0..band.len()).map(|i| i as f64).sum();
    let sum_y: f64 = band.iter().sum();
    let sum_xy: f64 = band.iter().enumerate().map(|(i, &y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..band.len()).map(|i| (i as f64) * (i as f64)).sum();
    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    let predicted = intercept + slope * peak_idx as f64;
    let cpp = peak_val - predicted;
    (cpp.is_finite() && cpp >= 0.0).then_some(cpp)
}

/// Triangular mel filterbank: `n_mels` rows of `fft_size/2 + 1` weights.
pub fn mel_filterbank(
    n_mels: usize,
    fft_size: usize,
    sample_rate: u32,
    fmin: f64,
    fmax: f64,
) -> Vec<Vec<f64>> {
    let n_freqs = fft_size / 2 + 1;
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);

    let mel_pts: Vec<f64> = (0..=(n_mels + 1))
        .map(|i| mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64)
        .collect();
    let hz_pts: Vec<f64> = mel_pts.iter().map(|&m| mel_to_hz(m)).collect();
    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|k| k as f64 * sample_rate as f64 / fft_size as f64)
        .collect();

    let mut filters = vec![vec![0f64; n_freqs]; n_mels];
    for m in 0..n_mels {
        let lower = hz_pts[m];
        let center = hz_pts[m + 1];
        let upper = hz_pts[m + 2];
        let down = (center - lower).max(1e-10);
        let up = (upper - center).max(1e-10);
        for (k, &freq) in fft_freqs.iter().enumerate() {
            filters[m][k] = if freq >= lower && freq <= center {
                (freq - lower) / down
            } else if freq > center && freq <= upper {
                (upper - freq) / up
            } else {
                0.0
            };
        }
    }
    filters
}

/// MFCCs for one power spectrum: log mel energies followed by DCT-II.
/// Returns `n_coeffs` coefficients (C0 included).
pub fn mfcc(power: &[f64], filterbank: &[Vec<f64>], n_coeffs: usize) -> Vec<f64> {
    use std::f64::consts::PI;

    let floor = 1e-10;
    let log_mel: Vec<f64> = filterbank
        .iter()
        .map(|filter| {
            let energy: f64 = filter
                .iter()
                .zip(power.iter())
                .map(|(&w, &p)| w * p)
                .sum();
            energy.max(floor).ln()
        })
        .collect();

    let n_mels = log_mel.len() as f64;
    (0..n_coeffs)
        .map(|c| {
            log_mel
                .iter()
                .enumerate()
                .map(|(m, &e)| e * (PI * c as f64 * (m as f64 + 0.5) / n_mels).cos())
                .sum()
        })
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mel_hz_roundtrip() {
        for &hz in &[0.0, 100.0, 440.0, 1000.0, 8000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert_relative_eq!(hz, back, epsilon = 1e-6);
        }
    }

    #[test]
    fn filterbank_rows_cover_spectrum() {
        let fb = mel_filterbank(26, 2048, 16_000, 0.0, 8_000.0);
        assert_eq!(fb.len(), 26);
        assert_eq!(fb[0].len(), 1025);
        for (m, filter) in fb.iter().enumerate() {
            let sum: f64 = filter.iter().sum();
            assert!(sum > 0.0, "filter {m} is empty");
        }
    }

    #[test]
    fn cpp_higher_for_periodic_than_noise() {
        let sr = 16_000u32;
        let analyzer = SpectrumAnalyzer::new(sr, 640, 2048);

        // Harmonic-rich periodic frame (pulse-ish: sum of 10 harmonics).
        let periodic: Vec<f32> = (0..640)
            .map(|i| {
                let t = i as f64 / sr as f64;
                let mut v = 0.0;
                for h in 1..=10 {
                    v += (2.0 * std::f64::consts::PI * 160.0 * h as f64 * t).sin() / h as f64;
                }
                (0.2 * v) as f32
            })
            .collect();

        // Deterministic pseudo-noise.
        let mut state = 0x9E3779B9u64;
        let noise: Vec<f32> = (0..640)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((state >> 33) as f64 / (1u64 << 30) as f64 - 1.0) as f32 * 0.2
            })
            .collect();

        let cpp_p = cpp_db(&analyzer, &analyzer.power_spectrum(&periodic), 75.0, 500.0)
            .expect("periodic cpp");
        let cpp_n =
            cpp_db(&analyzer, &analyzer.power_spectrum(&noise), 75.0, 500.0).unwrap_or(0.0);
        assert!(
            cpp_p > cpp_n + 3.0,
            "periodic cpp ({cpp_p:.1}) should clearly exceed noise cpp ({cpp_n:.1})"
        );
    }

    #[test]
    fn cpp_none_for_silence() {
        let analyzer = SpectrumAnalyzer::new(16_000, 640, 2048);
        let power = vec![0.0f64; 1025];
        assert!(cpp_db(&analyzer, &power, 75.0, 500.0).is_none());
    }

    #[test]
    fn mfcc_count_and_finiteness() {
        let analyzer = SpectrumAnalyzer::new(16_000, 400, 2048);
        let frame: Vec<f32> = (0..400)
            .map(|i| (2.0 * std::f64::consts::PI * 300.0 * i as f64 / 16_000.0).sin() as f32)
            .collect();
        let fb = mel_filterbank(26, 2048, 16_000, 0.0, 8_000.0);
        let coeffs = mfcc(&analyzer.power_spectrum(&frame), &fb, 13);
        assert_eq!(coeffs.len(), 13);
        assert!(coeffs.iter().all(|c| c.is_finite()));
    }
}
