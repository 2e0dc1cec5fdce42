//! Silence trimming and loudness normalization.
//!
//! Trimming walks 10 ms frames from both ends and discards everything below
//! an RMS threshold, keeping a short margin so soft onsets survive.
//! Loudness normalization scales to a target RMS level so downstream
//! thresholds are comparable across recordings.

/// Frame stride used for edge trimming (ms).
const TRIM_FRAME_MS: u32 = 10;

/// Root-mean-square of a sample slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Trim leading and trailing silence, returning the voiced interior.
///
/// Returns an empty slice when every frame is below `threshold`.
pub fn trim_silence(samples: &[f32], sample_rate: u32, threshold: f32, margin_ms: u32) -> &[f32] {
    let frame = (sample_rate * TRIM_FRAME_MS / 1000) as usize;
    if frame == 0 || samples.len() < frame {
        return if rms(samples) >= threshold {
            samples
        } else {
            &[]
        };
    }

    let margin = (sample_rate * margin_ms / 1000) as usize;
    let n_frames = samples.len() / frame;

    let first = (0..n_frames).find(|&i| rms(&samples[i * frame..(i + 1) * frame]) >= threshold);
    let Some(first) = first else {
        return &[];
    };
    // Unwrap is safe: `first` proved at least one frame is above threshold.
    let last = (0..n_frames)
        .rev()
        .find(|&i| rms(&samples[i * frame..(i + 1) * frame]) >= threshold)
        .unwrap();

    let start = (first * frame).saturating_sub(margin);
    let end = ((last + 1) * frame + margin).min(samples.len());
    &samples[start..end]
}

/// Scale the buffer to a target RMS level in dBFS, clipping to [-1, 1].
///
/// Silent buffers are left untouched (no gain explosion on near-zero RMS).
pub fn normalize_rms(samples: &mut [f32], target_dbfs: f32) {
    let current = rms(samples);
    if current <= 1e-6 {
        return;
    }
    let target = 10f32.powf(target_dbfs / 20.0);
    let gain = target / current;
    for s in samples.iter_mut() {
        *s = (*s * gain).clamp(-1.0, 1.0);
    }
}
