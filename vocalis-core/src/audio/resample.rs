//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Uploads arrive at whatever rate the browser recorder produced (commonly
//! 44.1 or 48 kHz). The engine analyzes at a fixed rate, so every request
//! passes through here once. When the rates already match, `RateConverter`
//! is a zero-copy passthrough and no rubato session is created at all.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{Result, VocalisError};

/// Input frame count per rubato call.
const CHUNK_SIZE: usize = 1024;

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Accumulation buffer — holds partial input chunks between calls.
    input_buf: Vec<f32>,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// Create a new converter.
    ///
    /// # Errors
    /// Returns `VocalisError::UnsupportedFormat` if rubato rejects the ratio
    /// (degenerate rates).
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self> {
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio — no dynamic adjustment
            PolynomialDegree::Cubic,
            CHUNK_SIZE,
            1, // mono
        )
        .map_err(|e| VocalisError::UnsupportedFormat {
            detail: format!("resampler init ({source_rate} Hz → {target_rate} Hz): {e}"),
        })?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            output_buf,
        })
    }

    /// Process incoming samples, returning resampled output (may be empty).
    ///
    /// Samples are accumulated internally until a full chunk is available for
    /// rubato. Any remainder is kept for the next call.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            // Zero-copy passthrough
            return samples.to_vec();
        };

        self.input_buf.extend_from_slice(samples);

        let mut result = Vec::new();

        while self.input_buf.len() >= CHUNK_SIZE {
            let input_slice = &self.input_buf[..CHUNK_SIZE];

            match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    result.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => {
                    tracing::error!("resampler process error: {e}");
                }
            }

            self.input_buf.drain(..CHUNK_SIZE);
        }

        result
    }

    /// Flush the internal remainder by zero-padding it to a full chunk.
    /// Call once after the final `process`.
    pub fn finish(&mut self) -> Vec<f32> {
        if self.resampler.is_none() || self.input_buf.is_empty() {
            return Vec::new();
        }
        let pad = CHUNK_SIZE - self.input_buf.len();
        let tail: Vec<f32> = std::iter::repeat(0f32).take(pad).collect();
        self.process(&tail)
    }

    /// Returns `true` when source rate == target rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

/// Resample a whole buffer in one call.
///
/// Output length is trimmed to `round(len * target/source)` so trailing
/// zero-pad from the final partial chunk never leaks into analysis.
pub fn resample_buffer(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    let mut rc = RateConverter::new(source_rate, target_rate)?;
    if rc.is_passthrough() {
        return Ok(samples.to_vec());
    }

    let mut out = rc.process(samples);
    out.extend(rc.finish());

    let expected =
        (samples.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    out.truncate(expected);
    Ok(out)
}
