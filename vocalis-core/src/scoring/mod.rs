//! Perceptual scoring.
//!
//! Pure function from `AcousticFeatures` to the score model the dashboard
//! renders: timbre, vocal weight, tone placement and the composite Sweet Spot
//! Score. Every mapping is a piecewise-linear normalization against the fixed
//! reference ranges below (ISO 226 equal-loudness-inspired weighting) — no
//! randomness, no hidden state, bit-reproducible for identical input.
//!
//! Unvoiced input (no F0 track) still produces a complete score: harmonic
//! measures fall back to neutral reference values and the result is flagged
//! `low_confidence`.

use serde::{Deserialize, Serialize};

use crate::features::AcousticFeatures;

// ---------------------------------------------------------------------------
// Reference ranges (product-tuned constants)
// ---------------------------------------------------------------------------

/// Spectral centroid range for brightness (Hz).
const CENTROID_REF: (f64, f64) = (1_000.0, 4_000.0);
/// HNR range for breathiness (dB).
const HNR_REF: (f64, f64) = (5.0, 30.0);
/// HNR range for clarity (dB) — narrower than the breathiness range.
const HNR_CLARITY_REF: (f64, f64) = (10.0, 25.0);
/// CPP range for vocal weight (dB).
const CPP_REF: (f64, f64) = (5.0, 20.0);
/// H1-H2 range for weight/pressedness (dB).
const H1_H2_REF: (f64, f64) = (-5.0, 15.0);
/// F2/F1 ratio range for forwardness.
const F2_F1_REF: (f64, f64) = (2.0, 4.0);
/// Centroid range for the forwardness contribution (Hz).
const CENTROID_FORWARD_REF: (f64, f64) = (1_500.0, 3_500.0);
/// Singer's-formant center and F3 distance range for the ring index (Hz).
const RING_CENTER_HZ: f64 = 3_000.0;
const RING_DISTANCE_REF: (f64, f64) = (0.0, 1_500.0);
/// Measured 2.5-3.5 kHz band energy fraction range for the ring index.
const RING_ENERGY_REF: (f64, f64) = (0.0, 0.30);
/// F1-F2 spacing range for nasality (Hz) — narrower spacing reads as nasal.
const NASALITY_SPACING_REF: (f64, f64) = (500.0, 1_500.0);

// Neutral fallbacks for harmonic measures on unvoiced input.
const FALLBACK_HNR_DB: f64 = 15.0;
const FALLBACK_CPP_DB: f64 = 12.0;
const FALLBACK_H1_H2_DB: f64 = 4.0;
const FALLBACK_JITTER_PCT: f64 = 0.5;
const FALLBACK_SHIMMER_PCT: f64 = 3.0;

// ---------------------------------------------------------------------------
// Score model
// ---------------------------------------------------------------------------

/// Spectral-shape scores, each in [0, 100].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimbreScores {
    pub brightness: f64,
    pub breathiness: f64,
    pub warmth: f64,
    pub roughness: f64,
}

/// Source-strength scores: light (0) to heavy (100), breathy (0) to
/// pressed (100).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightScores {
    pub weight: f64,
    pub pressed: f64,
}

/// Resonance/placement scores, each in [0, 100].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlacementScores {
    pub forwardness: f64,
    pub ring_index: f64,
    pub nasality: f64,
}

/// Composite Sweet Spot Score.
///
/// `total = clamp(0.25·clarity + 0.20·warmth + 0.20·presence +
/// 0.15·smoothness − 0.20·harshness_penalty, 0, 100)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweetSpotScore {
    pub clarity: f64,
    pub warmth: f64,
    pub presence: f64,
    pub smoothness: f64,
    pub harshness_penalty: f64,
    pub total: f64,
}

impl SweetSpotScore {
    /// The fixed composite weighting. Exposed so tests and auditing tools can
    /// recompute `total` from the components.
    pub fn recompute_total(&self) -> f64 {
        (0.25 * self.clarity + 0.20 * self.warmth + 0.20 * self.presence
            + 0.15 * self.smoothness
            - 0.20 * self.harshness_penalty)
            .clamp(0.0, 100.0)
    }
}

/// Full perceptual score for one analysis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerceptualScore {
    pub timbre: TimbreScores,
    pub weight: WeightScores,
    pub placement: PlacementScores,
    pub sweet_spot: SweetSpotScore,
    /// Set when harmonic measures were unavailable and spectral-only
    /// fallbacks were used.
    pub low_confidence: bool,
}

/// Map `features` to the perceptual score model.
pub fn score(features: &AcousticFeatures) -> PerceptualScore {
    let low_confidence = features.f0_range.is_none();

    let hnr = features.hnr.unwrap_or(FALLBACK_HNR_DB);
    let cpp = features.cpp.unwrap_or(FALLBACK_CPP_DB);
    let h1_h2 = features.h1_h2.unwrap_or(FALLBACK_H1_H2_DB);
    let jitter = features.jitter.unwrap_or(FALLBACK_JITTER_PCT);
    let shimmer = features.shimmer.unwrap_or(FALLBACK_SHIMMER_PCT);

    // ── Timbre ────────────────────────────────────────────────────────────
    let brightness = normalize_to_100(features.spectral_centroid, CENTROID_REF);
    let breathiness = 100.0 - normalize_to_100(hnr, HNR_REF);
    let warmth = (130.0 - brightness * 0.6).clamp(0.0, 100.0);
    let roughness = (jitter * 10.0 + shimmer * 3.0).clamp(0.0, 100.0);

    // ── Weight ────────────────────────────────────────────────────────────
    let cpp_score = normalize_to_100(cpp, CPP_REF);
    let h1_h2_inverse = 100.0 - normalize_to_100(h1_h2, H1_H2_REF);
    let weight = (cpp_score * 0.6 + h1_h2_inverse * 0.4).clamp(0.0, 100.0);
    let pressed = h1_h2_inverse;

    // ── Placement ─────────────────────────────────────────────────────────
    let [f1, f2, f3, _] = features.formants;
    let f2_f1_ratio = if f1 > 0.0 { f2 / f1 } else { 3.0 };
    let forwardness = (normalize_to_100(f2_f1_ratio, F2_F1_REF) * 0.5
        + normalize_to_100(features.spectral_centroid, CENTROID_FORWARD_REF) * 0.5)
        .clamp(0.0, 100.0);

    let ring_distance = (f3 - RING_CENTER_HZ).abs();
    let ring_from_f3 = 100.0 - normalize_to_100(ring_distance, RING_DISTANCE_REF);
    let ring_from_energy = normalize_to_100(features.ring_energy_ratio, RING_ENERGY_REF);
    let ring_index = (ring_from_f3 * 0.7 + ring_from_energy * 0.3).clamp(0.0, 100.0);

    let nasality = 100.0 - normalize_to_100(f2 - f1, NASALITY_SPACING_REF);

    // ── Sweet spot ────────────────────────────────────────────────────────
    let clarity = (normalize_to_100(hnr, HNR_CLARITY_REF) * 0.7
        + (100.0 - breathiness) * 0.3)
        .clamp(0.0, 100.0);
    let presence = (forwardness * 0.6 + ring_index * 0.4).clamp(0.0, 100.0);
    let smoothness = 100.0 - roughness;

    let mut harshness = 0.0;
    if brightness > 80.0 {
        harshness += (brightness - 80.0) * 0.5;
    }
    harshness += roughness * 0.3;
    let harshness_penalty = harshness.clamp(0.0, 100.0);

    let mut sweet_spot = SweetSpotScore {
        clarity,
        warmth,
        presence,
        smoothness,
        harshness_penalty,
        total: 0.0,
    };
    sweet_spot.total = sweet_spot.recompute_total();

    PerceptualScore {
        timbre: TimbreScores {
            brightness,
            breathiness,
            warmth,
            roughness,
        },
        weight: WeightScores { weight, pressed },
        placement: PlacementScores {
            forwardness,
            ring_index,
            nasality,
        },
        sweet_spot,
        low_confidence,
    }
}

/// Piecewise-linear normalization of `value` against `(min, max)` into
/// [0, 100], clamped.
fn normalize_to_100(value: f64, range: (f64, f64)) -> f64 {
    let (min, max) = range;
    if (max - min).abs() < f64::EPSILON {
        return 50.0;
    }
    ((value - min) / (max - min) * 100.0).clamp(0.0, 100.0)
}
