//! Voice signatures: enrollment aggregation and the in-memory registry.
//!
//! ## Concurrency
//!
//! The registry is read-mostly: concurrent verifications take the read lock,
//! enrollment and deletion take the write lock. There is no global engine
//! lock. Deletion is synchronous and irreversible — once `delete` returns,
//! no subsequent probe can match the removed signature (GDPR erasure).

pub mod matcher;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::api::{AudioType, SignatureStatus, SignatureSummary};
use crate::embedding::{l2_normalize, SpeakerEmbedding};
use crate::error::{Result, VocalisError};

/// Minimum valid samples for enrollment.
pub const MIN_ENROLLMENT_SAMPLES: usize = 3;

/// An enrolled voice signature.
///
/// Holds derived vectors only — never raw audio.
#[derive(Debug, Clone)]
pub struct VoiceSignature {
    pub id: String,
    pub name: String,
    pub enrolled_at: DateTime<Utc>,
    /// Contributing sample embeddings, in enrollment order.
    pub samples: Vec<SpeakerEmbedding>,
    /// L2-normalized mean of the spoken samples, if any.
    pub spoken_centroid: Option<Vec<f32>>,
    /// L2-normalized mean of the sung samples, if any.
    pub singing_centroid: Option<Vec<f32>>,
    pub quality_score: f64,
    pub status: SignatureStatus,
}

impl VoiceSignature {
    /// Build a signature from ≥ 3 valid sample embeddings.
    ///
    /// # Errors
    /// `VocalisError::InsufficientSamples` when fewer than
    /// `MIN_ENROLLMENT_SAMPLES` embeddings are provided, or
    /// `VocalisError::EmbeddingDimensionMismatch` if they disagree on
    /// dimensionality.
    pub fn enroll(name: &str, samples: Vec<SpeakerEmbedding>) -> Result<Self> {
        if samples.len() < MIN_ENROLLMENT_SAMPLES {
            return Err(VocalisError::InsufficientSamples {
                valid: samples.len(),
                required: MIN_ENROLLMENT_SAMPLES,
            });
        }
        let dim = samples[0].vector.len();
        if let Some(bad) = samples.iter().find(|s| s.vector.len() != dim) {
            return Err(VocalisError::EmbeddingDimensionMismatch {
                probe: bad.vector.len(),
                stored: dim,
            });
        }

        let spoken: Vec<&SpeakerEmbedding> = samples
            .iter()
            .filter(|s| s.mode == AudioType::Spoken)
            .collect();
        let sung: Vec<&SpeakerEmbedding> = samples
            .iter()
            .filter(|s| s.mode == AudioType::Sung)
            .collect();

        let quality_score = enrollment_quality(&samples);

        Ok(Self {
            id: format!("sig_{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            enrolled_at: Utc::now(),
            spoken_centroid: centroid(&spoken),
            singing_centroid: centroid(&sung),
            quality_score,
            samples,
            status: SignatureStatus::Active,
        })
    }

    /// Centroid for the requested mode, falling back to whichever exists.
    pub fn centroid_for(&self, mode: AudioType) -> Option<&Vec<f32>> {
        let preferred = match mode {
            AudioType::Spoken => self.spoken_centroid.as_ref(),
            AudioType::Sung => self.singing_centroid.as_ref(),
        };
        preferred
            .or(self.spoken_centroid.as_ref())
            .or(self.singing_centroid.as_ref())
    }

    pub fn summary(&self) -> SignatureSummary {
        SignatureSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            enrolled_at: self.enrolled_at,
            samples_count: self.samples.len(),
            quality_score: self.quality_score,
            status: self.status,
            has_spoken_centroid: self.spoken_centroid.is_some(),
            has_singing_centroid: self.singing_centroid.is_some(),
        }
    }
}

/// L2-normalized mean vector, `None` for an empty set.
fn centroid(samples: &[&SpeakerEmbedding]) -> Option<Vec<f32>> {
    let first = samples.first()?;
    let dim = first.vector.len();
    let mut acc = vec![0.0f64; dim];
    for s in samples {
        for (a, &v) in acc.iter_mut().zip(s.vector.iter()) {
            *a += v as f64;
        }
    }
    let n = samples.len() as f64;
    let mut mean: Vec<f32> = acc.iter().map(|&a| (a / n) as f32).collect();
    l2_normalize(&mut mean);
    Some(mean)
}

/// Enrollment quality: 0.4 × mean per-sample quality + 0.6 × cohesion.
///
/// Cohesion is the mean pairwise cosine similarity of the contributing
/// embeddings mapped onto [0, 100] — tight clustering scores high, divergent
/// takes flag the signature for re-recording.
fn enrollment_quality(samples: &[SpeakerEmbedding]) -> f64 {
    let mean_sample_quality =
        samples.iter().map(|s| s.quality).sum::<f64>() / samples.len() as f64;

    let mut pair_sims = Vec::new();
    for i in 0..samples.len() {
        for j in (i + 1)..samples.len() {
            pair_sims.push(matcher::cosine_similarity_unchecked(
                &samples[i].vector,
                &samples[j].vector,
            ));
        }
    }
    let cohesion = if pair_sims.is_empty() {
        100.0
    } else {
        let mean_sim = pair_sims.iter().sum::<f64>() / pair_sims.len() as f64;
        (mean_sim.clamp(0.0, 1.0)) * 100.0
    };

    (0.4 * mean_sample_quality + 0.6 * cohesion).clamp(0.0, 100.0)
}

/// Read-mostly in-memory signature registry.
#[derive(Debug, Default)]
pub struct SignatureStore {
    inner: RwLock<HashMap<String, VoiceSignature>>,
}

impl SignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly enrolled signature and return its id.
    pub fn insert(&self, signature: VoiceSignature) -> String {
        let id = signature.id.clone();
        info!(id = id.as_str(), name = signature.name.as_str(), "signature enrolled");
        self.inner.write().insert(id.clone(), signature);
        id
    }

    /// Snapshot of one signature.
    pub fn get(&self, id: &str) -> Result<VoiceSignature> {
        self.inner
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| VocalisError::SignatureNotFound { id: id.to_string() })
    }

    /// Irreversibly remove a signature. Synchronous: once this returns, the
    /// signature can no longer match any probe.
    pub fn delete(&self, id: &str) -> Result<()> {
        match self.inner.write().remove(id) {
            Some(_) => {
                info!(id, "signature deleted");
                Ok(())
            }
            None => Err(VocalisError::SignatureNotFound { id: id.to_string() }),
        }
    }

    /// All active signatures (candidates for 1:N verification).
    pub fn active(&self) -> Vec<VoiceSignature> {
        self.inner
            .read()
            .values()
            .filter(|s| s.status == SignatureStatus::Active)
            .cloned()
            .collect()
    }

    pub fn summaries(&self) -> Vec<SignatureSummary> {
        let mut rows: Vec<SignatureSummary> =
            self.inner.read().values().map(|s| s.summary()).collect();
        rows.sort_by(|a, b| a.enrolled_at.cmp(&b.enrolled_at));
        rows
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
