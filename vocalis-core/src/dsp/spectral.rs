//! Scalar measures over a single power spectrum.
//!
//! All functions take the `fft_size/2 + 1` bin power spectrum produced by
//! `SpectrumAnalyzer::power_spectrum` plus the bin width in Hz, and return
//! finite values or `None` — degenerate frames never produce NaN/Inf here.

/// Spectral centroid in Hz (power-weighted mean frequency).
pub fn centroid_hz(power: &[f64], bin_hz: f64) -> Option<f64> {
    let total: f64 = power.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let weighted: f64 = power
        .iter()
        .enumerate()
        .map(|(k, &p)| k as f64 * bin_hz * p)
        .sum();
    let c = weighted / total;
    c.is_finite().then_some(c)
}

/// Frequency below which `fraction` of the total spectral energy lies.
pub fn rolloff_hz(power: &[f64], bin_hz: f64, fraction: f64) -> Option<f64> {
    let total: f64 = power.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let target = total * fraction;
    let mut acc = 0.0;
    for (k, &p) in power.iter().enumerate() {
        acc += p;
        if acc >= target {
            return Some(k as f64 * bin_hz);
        }
    }
    Some((power.len() - 1) as f64 * bin_hz)
}

/// Fraction of total energy inside [lo_hz, hi_hz]. Returns 0 for empty input.
pub fn band_energy_ratio(power: &[f64], bin_hz: f64, lo_hz: f64, hi_hz: f64) -> f64 {
    let total: f64 = power.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let band: f64 = power
        .iter()
        .enumerate()
        .filter(|(k, _)| {
            let f = *k as f64 * bin_hz;
            f >= lo_hz && f <= hi_hz
        })
        .map(|(_, &p)| p)
        .sum();
    band / total
}

/// Spectral flatness (Wiener entropy): geometric mean / arithmetic mean of
/// the power spectrum, in [0, 1]. 1 for white noise, → 0 for pure tones.
pub fn flatness(power: &[f64]) -> f64 {
    if power.is_empty() {
        return 0.0;
    }
    let floor = 1e-12;
    let log_mean: f64 =
        power.iter().map(|&p| p.max(floor).ln()).sum::<f64>() / power.len() as f64;
    let mean: f64 = power.iter().map(|&p| p.max(floor)).sum::<f64>() / power.len() as f64;
    (log_mean.exp() / mean).clamp(0.0, 1.0)
}

/// Peak magnitude (dB) within ±`tolerance` (fractional) of `target_hz`.
/// Used to read harmonic amplitudes off the spectrum.
pub fn harmonic_amplitude_db(
    power: &[f64],
    bin_hz: f64,
    target_hz: f64,
    tolerance: f64,
) -> Option<f64> {
    let lo = ((target_hz * (1.0 - tolerance)) / bin_hz).floor().max(0.0) as usize;
    let hi = (((target_hz * (1.0 + tolerance)) / bin_hz).ceil() as usize).min(power.len() - 1);
    if lo >= hi {
        return None;
    }
    let peak = power[lo..=hi].iter().cloned().fold(0.0f64, f64::max);
    if peak <= 0.0 {
        return None;
    }
    Some(10.0 * peak.log10())
}

/// H1−H2: dB difference between the first two harmonic amplitudes at the
/// given F0. `None` when either harmonic is unreadable (above Nyquist,
/// silent band).
pub fn h1_h2_db(power: &[f64], bin_hz: f64, f0: f64) -> Option<f64> {
    let nyquist = (power.len() - 1) as f64 * bin_hz;
    if f0 <= 0.0 || 2.0 * f0 >= nyquist {
        return None;
    }
    let h1 = harmonic_amplitude_db(power, bin_hz, f0, 0.1)?;
    let h2 = harmonic_amplitude_db(power, bin_hz, 2.0 * f0, 0.1)?;
    let diff = h1 - h2;
    diff.is_finite().then_some(diff)
}

/// Fold the spectrum into 12 pitch-class energies (A440 reference),
/// normalized to sum 1. Bins below 55 Hz and above 4 kHz are ignored.
pub fn chroma_profile(power: &[f64], bin_hz: f64) -> [f64; 12] {
    let mut classes = [0.0f64; 12];
    for (k, &p) in power.iter().enumerate() {
        let f = k as f64 * bin_hz;
        if !(55.0..=4_000.0).contains(&f) || p <= 0.0 {
            continue;
        }
        let semitones = 12.0 * (f / 440.0).log2();
        let pc = ((semitones.round() as i64 % 12) + 12) % 12;
        classes[pc as usize] += p;
    }
    let total: f64 = classes.iter().sum();
    if total > 0.0 {
        for c in classes.iter_mut() {
            *c /= total;
        }
    }
    classes
}
