//! Probe-to-signature matching.
//!
//! Cosine similarity against candidate centroids with two gates:
//! a fixed decision threshold, and (for 1:N searches) a minimum margin over
//! the runner-up so two near-equidistant signatures never produce a false
//! accept. Reported confidence is a monotonic transform of similarity onto
//! the percentage scale, never the raw cosine.

use chrono::{DateTime, Utc};

use super::VoiceSignature;
use crate::antispoof::AntiSpoofingResult;
use crate::api::AudioType;
use crate::error::{Result, VocalisError};

/// Matching thresholds. Product-tuned constants.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Minimum cosine similarity for a positive match. Default: 0.75.
    pub decision_threshold: f64,
    /// Minimum lead over the second-best candidate in a 1:N search.
    /// Default: 0.05.
    pub ambiguity_margin: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.75,
            ambiguity_margin: 0.05,
        }
    }
}

/// Outcome of scoring a probe against a candidate set.
///
/// "No match" is represented here as `matched: None` — it is a normal
/// result, not an error.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// `(id, name)` of the accepted signature.
    pub matched: Option<(String, String)>,
    /// Confidence percentage for the best candidate (reported even on
    /// no-match).
    pub confidence: f64,
    /// Raw best cosine similarity (diagnostic, not part of the wire shape).
    pub similarity: f64,
}

/// One verification attempt, for the write-once attempt log. The probe
/// embedding itself is intentionally absent — it does not outlive the
/// request.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    pub matched_signature_id: Option<String>,
    pub confidence: f64,
    pub anti_spoofing: AntiSpoofingResult,
    pub timestamp: DateTime<Utc>,
}

/// Cosine similarity with a dimensionality check.
///
/// # Errors
/// `VocalisError::EmbeddingDimensionMismatch` when the vectors disagree —
/// that is model/version skew, not a legitimate no-match.
pub fn cosine_similarity(probe: &[f32], stored: &[f32]) -> Result<f64> {
    if probe.len() != stored.len() {
        return Err(VocalisError::EmbeddingDimensionMismatch {
            probe: probe.len(),
            stored: stored.len(),
        });
    }
    Ok(cosine_similarity_unchecked(probe, stored))
}

/// Cosine similarity for same-length vectors (callers guarantee dimensions).
pub(crate) fn cosine_similarity_unchecked(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        norm_a += x as f64 * x as f64;
        norm_b += y as f64 * y as f64;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom <= 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Monotonic map of cosine similarity [-1, 1] onto the percentage scale.
pub fn confidence_percent(similarity: f64) -> f64 {
    ((similarity + 1.0) / 2.0 * 100.0).clamp(0.0, 100.0)
}

/// Score a probe embedding against the candidate signatures.
///
/// The centroid compared against is selected by `mode` (falling back to the
/// mode the signature actually has). Similarity-based matching alone — the
/// fail-closed anti-spoofing policy is applied by the engine on top of this
/// outcome.
pub fn match_probe(
    probe: &[f32],
    candidates: &[VoiceSignature],
    mode: AudioType,
    cfg: &MatchConfig,
) -> Result<MatchOutcome> {
    let mut scored: Vec<(f64, &VoiceSignature)> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(centroid) = candidate.centroid_for(mode) else {
            continue;
        };
        let similarity = cosine_similarity(probe, centroid)?;
        scored.push((similarity, candidate));
    }

    if scored.is_empty() {
        return Ok(MatchOutcome {
            matched: None,
            confidence: 0.0,
            similarity: -1.0,
        });
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let (best_sim, best) = (scored[0].0, scored[0].1);
    let second_sim = scored.get(1).map(|(s, _)| *s);

    let above_threshold = best_sim >= cfg.decision_threshold;
    let unambiguous = match second_sim {
        Some(second) => best_sim - second >= cfg.ambiguity_margin,
        None => true,
    };

    let matched = (above_threshold && unambiguous)
        .then(|| (best.id.clone(), best.name.clone()));

    Ok(MatchOutcome {
        matched,
        confidence: confidence_percent(best_sim),
        similarity: best_sim,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{l2_normalize, SpeakerEmbedding};

    fn unit(seed: &[f32]) -> Vec<f32> {
        let mut v = vec![0.0f32; 16];
        for (i, &s) in seed.iter().enumerate() {
            v[i] = s;
        }
        l2_normalize(&mut v);
        v
    }

    fn signature(name: &str, axis: &[f32]) -> VoiceSignature {
        let make = |jig: f32| SpeakerEmbedding {
            vector: {
                let mut v = unit(axis);
                v[15] += jig;
                l2_normalize(&mut v);
                v
            },
            mode: AudioType::Spoken,
            quality: 90.0,
        };
        VoiceSignature::enroll(name, vec![make(0.0), make(0.005), make(0.01)]).unwrap()
    }

    #[test]
    fn probe_equal_to_centroid_matches() {
        let sig = signature("Primary", &[1.0, 0.0]);
        let probe = sig.spoken_centroid.clone().unwrap();
        let outcome =
            match_probe(&probe, &[sig], AudioType::Spoken, &MatchConfig::default()).unwrap();
        assert!(outcome.matched.is_some());
        assert!(outcome.similarity > 0.999);
        assert!(outcome.confidence > confidence_percent(MatchConfig::default().decision_threshold) - 1.0);
    }

    #[test]
    fn orthogonal_probe_does_not_match() {
        let sig = signature("Primary", &[1.0, 0.0]);
        let probe = unit(&[0.0, 1.0]);
        let outcome =
            match_probe(&probe, &[sig], AudioType::Spoken, &MatchConfig::default()).unwrap();
        assert!(outcome.matched.is_none(), "orthogonal probe must not match");
        // Confidence is still reported (≈ 50 for zero similarity).
        assert!(outcome.confidence < 60.0);
    }

    #[test]
    fn ambiguous_candidates_rejected_by_margin() {
        // Two signatures along the same axis — probe is near-equidistant.
        let a = signature("A", &[1.0, 0.02]);
        let b = signature("B", &[1.0, -0.02]);
        let probe = unit(&[1.0, 0.0]);
        let outcome = match_probe(
            &probe,
            &[a, b],
            AudioType::Spoken,
            &MatchConfig::default(),
        )
        .unwrap();
        assert!(
            outcome.matched.is_none(),
            "near-tie must be rejected (similarity={:.4})",
            outcome.similarity
        );
        assert!(outcome.similarity > 0.9, "both candidates are close");
    }

    #[test]
    fn clear_winner_beats_margin() {
        let a = signature("A", &[1.0, 0.0]);
        let b = signature("B", &[0.0, 1.0]);
        let probe = unit(&[1.0, 0.05]);
        let outcome = match_probe(
            &probe,
            &[a, b],
            AudioType::Spoken,
            &MatchConfig::default(),
        )
        .unwrap();
        let (_, name) = outcome.matched.expect("clear winner should match");
        assert_eq!(name, "A");
    }

    #[test]
    fn empty_candidate_set_is_no_match() {
        let probe = unit(&[1.0]);
        let outcome =
            match_probe(&probe, &[], AudioType::Spoken, &MatchConfig::default()).unwrap();
        assert!(outcome.matched.is_none());
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let sig = signature("Primary", &[1.0]);
        let probe = vec![1.0f32; 8];
        let err = match_probe(&probe, &[sig], AudioType::Spoken, &MatchConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), "embedding_dimension_mismatch");
    }

    #[test]
    fn confidence_transform_is_monotonic_and_bounded() {
        assert_eq!(confidence_percent(-1.0), 0.0);
        assert_eq!(confidence_percent(1.0), 100.0);
        assert!(confidence_percent(0.8) > confidence_percent(0.5));
        assert_eq!(confidence_percent(0.0), 50.0);
    }
}
