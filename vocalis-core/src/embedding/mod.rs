//! Speaker embedding extraction.
//!
//! The `EmbeddingModel` trait decouples the engine from any specific
//! embedding backend. Implementations must be **deterministic**: identical
//! input samples produce identical vectors (inference-only, fixed weights).
//! The default backend is `SpectralEmbedder`, a DSP-derived statistics
//! embedding; a neural backend can be slotted in without touching the
//! matcher.

pub mod spectral;

pub use spectral::SpectralEmbedder;

use std::sync::Arc;

use crate::api::AudioType;
use crate::audio::AudioSample;
use crate::cancel::CancelFlag;
use crate::error::Result;

/// Default embedding dimensionality. Fixed per deployment — every sample and
/// every stored centroid must share it.
pub const DEFAULT_EMBEDDING_DIM: usize = 256;

/// One sample's embedding, tagged with the mode it contributes to.
#[derive(Debug, Clone)]
pub struct SpeakerEmbedding {
    /// L2-normalized vector of the deployment's fixed dimensionality.
    pub vector: Vec<f32>,
    /// Which sub-centroid stream this sample feeds.
    pub mode: AudioType,
    /// Per-sample reliability score in [0, 100].
    pub quality: f64,
}

/// Contract for embedding backends.
pub trait EmbeddingModel: Send + Sync + 'static {
    /// Vector length produced by this model. Constant for its lifetime.
    fn dimension(&self) -> usize;

    /// Produce the embedding vector for a normalized sample.
    ///
    /// Must be deterministic for identical input. The returned vector is
    /// L2-normalized and exactly `dimension()` long.
    fn embed(&self, sample: &AudioSample, cancel: &CancelFlag) -> Result<Vec<f32>>;
}

/// Thread-safe reference-counted handle to any `EmbeddingModel`.
///
/// Backends are stateless at inference time, so a plain `Arc` suffices —
/// no lock, concurrent requests share one instance.
#[derive(Clone)]
pub struct EmbedderHandle(pub Arc<dyn EmbeddingModel>);

impl EmbedderHandle {
    /// Wrap any `EmbeddingModel` in an `EmbedderHandle`.
    pub fn new<M: EmbeddingModel>(model: M) -> Self {
        Self(Arc::new(model))
    }

    /// Embed one sample and attach its mode tag and quality score.
    pub fn extract(
        &self,
        sample: &AudioSample,
        mode: AudioType,
        cancel: &CancelFlag,
    ) -> Result<SpeakerEmbedding> {
        let vector = self.0.embed(sample, cancel)?;
        debug_assert_eq!(vector.len(), self.0.dimension());
        Ok(SpeakerEmbedding {
            vector,
            mode,
            quality: sample_quality(sample),
        })
    }
}

impl std::fmt::Debug for EmbedderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedderHandle")
            .field("dimension", &self.0.dimension())
            .finish_non_exhaustive()
    }
}

/// Per-sample reliability: duration adequacy (optimal 2-4 s), clipping,
/// and energy, combined 0.4 / 0.3 / 0.3.
pub fn sample_quality(sample: &AudioSample) -> f64 {
    let duration = sample.duration_secs();
    let duration_score = if duration < 1.0 {
        duration * 50.0
    } else if duration <= 4.0 {
        100.0
    } else {
        (100.0 - (duration - 4.0) * 5.0).max(50.0)
    };

    let n = sample.samples.len().max(1) as f64;
    let clipped = sample
        .samples
        .iter()
        .filter(|s| s.abs() > 0.99)
        .count() as f64;
    let clipping_score = (100.0 - clipped / n * 200.0).max(0.0);

    let rms = crate::audio::normalize::rms(&sample.samples) as f64;
    let rms_score = (rms * 1_000.0).min(100.0);

    (0.4 * duration_score + 0.3 * clipping_score + 0.3 * rms_score).clamp(0.0, 100.0)
}

/// L2-normalize in place (f64 accumulation for cross-platform stability).
pub fn l2_normalize(v: &mut [f32]) {
    let mut norm: f64 = 0.0;
    for &x in v.iter() {
        norm += (x as f64) * (x as f64);
    }
    norm = norm.sqrt();
    if norm > 0.0 {
        let scale = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= scale;
        }
    }
}
