//! Frame-level signal analysis primitives.
//!
//! Everything here is a pure function of its inputs — no hidden state, no
//! randomness. Determinism of the whole engine (scores, embeddings) rests on
//! that property, so keep it.
//!
//! Consumers drive their own frame loops; this module only supplies the
//! per-frame math (windows, spectra, cepstra, pitch, LPC).

pub mod cepstrum;
pub mod lpc;
pub mod pitch;
pub mod spectral;

use std::sync::Arc;

use rustfft::{num_complex::Complex, FftPlanner};

/// Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f64> {
    use std::f64::consts::PI;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / n as f64).cos()))
        .collect()
}

/// Hamming window of length `n`.
pub fn hamming_window(n: usize) -> Vec<f64> {
    use std::f64::consts::PI;
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Number of complete frames for a given buffer/frame/hop geometry.
pub fn frame_count(len: usize, frame_len: usize, hop: usize) -> usize {
    if len < frame_len || hop == 0 {
        0
    } else {
        (len - frame_len) / hop + 1
    }
}

/// Windowed FFT front-end shared by the feature, embedding and anti-spoofing
/// paths. Plans are created once and reused for every frame.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn rustfft::Fft<f64>>,
    ifft: Arc<dyn rustfft::Fft<f64>>,
    window: Vec<f64>,
    pub frame_len: usize,
    pub fft_size: usize,
    pub sample_rate: u32,
}

impl SpectrumAnalyzer {
    /// `fft_size` must be >= `frame_len`; frames are zero-padded up to it.
    pub fn new(sample_rate: u32, frame_len: usize, fft_size: usize) -> Self {
        debug_assert!(fft_size >= frame_len);
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);
        Self {
            fft,
            ifft,
            window: hamming_window(frame_len),
            frame_len,
            fft_size,
            sample_rate,
        }
    }

    /// Width of one FFT bin in Hz.
    pub fn bin_hz(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Windowed, zero-padded power spectrum: `fft_size/2 + 1` bins of |X|².
    pub fn power_spectrum(&self, frame: &[f32]) -> Vec<f64> {
        let mut buf = vec![Complex::new(0.0, 0.0); self.fft_size];
        let n = frame.len().min(self.frame_len);
        for i in 0..n {
            buf[i] = Complex::new(frame[i] as f64 * self.window[i], 0.0);
        }
        self.fft.process(&mut buf);
        (0..=self.fft_size / 2).map(|k| buf[k].norm_sqr()).collect()
    }

    /// Real cepstrum of a dB-magnitude spectrum: IFFT of the symmetric
    /// log-spectrum. Returns `fft_size/2` quefrency samples (in dB units).
    pub fn cepstrum_db(&self, power_half: &[f64]) -> Vec<f64> {
        debug_assert_eq!(power_half.len(), self.fft_size / 2 + 1);
        let floor = 1e-12;
        let mut buf = vec![Complex::new(0.0, 0.0); self.fft_size];
        for (k, &p) in power_half.iter().enumerate() {
            // 10·log10(|X|²) == 20·log10(|X|)
            let db = 10.0 * p.max(floor).log10();
            buf[k] = Complex::new(db, 0.0);
            if k > 0 && k < self.fft_size / 2 {
                buf[self.fft_size - k] = Complex::new(db, 0.0);
            }
        }
        self.ifft.process(&mut buf);
        // rustfft does not normalize the inverse transform.
        let scale = 1.0 / self.fft_size as f64;
        (0..self.fft_size / 2).map(|q| buf[q].re * scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frame_count_geometry() {
        assert_eq!(frame_count(400, 400, 160), 1);
        assert_eq!(frame_count(800, 400, 160), 3);
        assert_eq!(frame_count(399, 400, 160), 0);
        assert_eq!(frame_count(16_000, 400, 160), 98);
    }

    #[test]
    fn power_spectrum_peaks_at_tone_bin() {
        let sr = 16_000u32;
        let analyzer = SpectrumAnalyzer::new(sr, 400, 2048);
        let freq = 1_000.0;
        let frame: Vec<f32> = (0..400)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sr as f64).sin() as f32)
            .collect();
        let power = analyzer.power_spectrum(&frame);

        let peak_bin = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, _)| k)
            .unwrap();
        let peak_hz = peak_bin as f64 * analyzer.bin_hz();
        assert!(
            (peak_hz - freq).abs() < 2.0 * analyzer.bin_hz(),
            "peak at {peak_hz} Hz, expected ~{freq} Hz"
        );
    }

    #[test]
    fn cepstrum_of_flat_spectrum_is_impulse() {
        let analyzer = SpectrumAnalyzer::new(16_000, 400, 512);
        let flat = vec![1.0f64; 257];
        let ceps = analyzer.cepstrum_db(&flat);
        // log of a flat spectrum is constant → all energy in quefrency 0.
        assert_relative_eq!(ceps[0], 0.0, epsilon = 1e-9);
        for &c in &ceps[1..] {
            assert!(c.abs() < 1e-9);
        }
    }

    #[test]
    fn hann_window_endpoints() {
        let w = hann_window(400);
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-12);
        assert!(w[200] > 0.99);
    }
}
