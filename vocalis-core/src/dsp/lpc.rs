//! Linear-prediction formant analysis.
//!
//! Per voiced frame: pre-emphasis → Hamming window → autocorrelation →
//! Levinson-Durbin → all-pole polynomial roots (Durand-Kerner) → root angles
//! as formant frequencies, root radii as bandwidths.

use rustfft::num_complex::Complex;

use super::hamming_window;

/// Pre-emphasis coefficient applied before LPC (lifts the spectral tilt so
/// higher formants are resolvable).
const PRE_EMPHASIS: f64 = 0.97;

/// Roots with bandwidth above this are spurious poles, not formants (Hz).
const MAX_FORMANT_BANDWIDTH_HZ: f64 = 400.0;

/// Formants below this are pitch harmonics / DC artifacts (Hz).
const MIN_FORMANT_HZ: f64 = 90.0;

/// Levinson-Durbin recursion over autocorrelation lags `r[0..=order]`.
///
/// Returns predictor coefficients `a[1..=order]` of
/// `A(z) = 1 + a₁z⁻¹ + … + aₚz⁻ᵖ`, or `None` for degenerate input
/// (zero energy or an unstable recursion).
pub fn levinson(r: &[f64], order: usize) -> Option<Vec<f64>> {
    if r.len() < order + 1 || r[0] <= 0.0 {
        return None;
    }

    let mut a = vec![0.0f64; order + 1];
    a[0] = 1.0;
    let mut e = r[0];

    for i in 1..=order {
        let mut acc = r[i];
        for j in 1..i {
            acc += a[j] * r[i - j];
        }
        let k = -acc / e;
        if !k.is_finite() || k.abs() >= 1.0 {
            return None;
        }

        let prev = a.clone();
        for j in 1..i {
            a[j] = prev[j] + k * prev[i - j];
        }
        a[i] = k;

        e *= 1.0 - k * k;
        if e <= 0.0 {
            return None;
        }
    }

    Some(a[1..].to_vec())
}

/// Roots of the monic polynomial `xⁿ + c₁xⁿ⁻¹ + … + cₙ` via Durand-Kerner
/// simultaneous iteration. Deterministic: fixed initial guesses, fixed
/// iteration cap.
pub fn polynomial_roots(coeffs: &[f64]) -> Vec<Complex<f64>> {
    let n = coeffs.len();
    if n == 0 {
        return Vec::new();
    }

    let eval = |x: Complex<f64>| -> Complex<f64> {
        let mut acc = Complex::new(1.0, 0.0);
        for &c in coeffs {
            acc = acc * x + Complex::new(c, 0.0);
        }
        acc
    };

    // Standard starting configuration: powers of a non-real seed.
    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex<f64>> = (0..n).map(|k| seed.powu(k as u32 + 1)).collect();

    for _ in 0..100 {
        let mut max_delta = 0.0f64;
        for k in 0..n {
            let mut denom = Complex::new(1.0, 0.0);
            for j in 0..n {
                if j != k {
                    denom *= roots[k] - roots[j];
                }
            }
            if denom.norm_sqr() < 1e-30 {
                continue;
            }
            let delta = eval(roots[k]) / denom;
            roots[k] -= delta;
            max_delta = max_delta.max(delta.norm());
        }
        if max_delta < 1e-10 {
            break;
        }
    }

    roots
}

/// Formant frequencies (Hz, ascending) for one frame.
///
/// Returns up to `max_formants` entries; an empty vec when the frame is
/// degenerate (silence, unstable LPC). Callers exclude empty results from
/// aggregation rather than propagating them.
pub fn formants_from_frame(
    frame: &[f32],
    sample_rate: u32,
    order: usize,
    max_formants: usize,
) -> Vec<f64> {
    let n = frame.len();
    if n <= order * 2 {
        return Vec::new();
    }

    // Pre-emphasis + window.
    let window = hamming_window(n);
    let mut x = vec![0.0f64; n];
    x[0] = frame[0] as f64 * (1.0 - PRE_EMPHASIS);
    for i in 1..n {
        x[i] = frame[i] as f64 - PRE_EMPHASIS * frame[i - 1] as f64;
    }
    for i in 0..n {
        x[i] *= window[i];
    }

    // Autocorrelation lags 0..=order.
    let mut r = vec![0.0f64; order + 1];
    for (lag, r_lag) in r.iter_mut().enumerate() {
        *r_lag = (0..n - lag).map(|i| x[i] * x[i + lag]).sum();
    }

    let Some(a) = levinson(&r, order) else {
        return Vec::new();
    };

    let sr = sample_rate as f64;
    let nyquist = sr / 2.0;
    let mut formants: Vec<f64> = polynomial_roots(&a)
        .into_iter()
        .filter(|root| root.im > 0.0)
        .filter_map(|root| {
            let mag = root.norm();
            if mag <= 0.0 || mag >= 1.0 {
                return None;
            }
            let freq = root.im.atan2(root.re) * sr / (2.0 * std::f64::consts::PI);
            let bandwidth = -(sr / std::f64::consts::PI) * mag.ln();
            let valid = freq.is_finite()
                && freq > MIN_FORMANT_HZ
                && freq < nyquist - 50.0
                && bandwidth < MAX_FORMANT_BANDWIDTH_HZ;
            valid.then_some(freq)
        })
        .collect();

    formants.sort_by(|a, b| a.partial_cmp(b).unwrap());
    formants.truncate(max_formants);
    formants
}
