//! Response and request payloads.
//!
//! ## Conventions
//!
//! | Rule | Detail |
//! |------|--------|
//! | Field casing | snake_case, verbatim |
//! | Scores | percentages in [0, 100] |
//! | Frequencies | Hz |
//! | Ratios (HNR, CPP, H1-H2) | dB |
//! | Missing measurements | `null` (frontend renders "N/A") |
//!
//! Raw audio bytes never appear in any payload — only derived numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::antispoof::AntiSpoofingResult;
use crate::scoring::{PlacementScores, SweetSpotScore, TimbreScores, WeightScores};

// ---------------------------------------------------------------------------
// Closed enumerations (frontend literal unions)
// ---------------------------------------------------------------------------

/// Whether a sample is speech or singing. Selects the pitch search range and
/// the signature sub-centroid the sample contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioType {
    Spoken,
    Sung,
}

/// What the user was asked to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Sustained,
    Passage,
    Verse,
}

/// Delivery style requested for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    Command,
    Intimate,
    Storyteller,
    Whisper,
    Urgent,
}

/// Target listening context for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerceptualProfile {
    Podcast,
    Warm,
    Broadcast,
    Asmr,
}

/// Prosodic inflection overlays for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inflection {
    Punch,
    Drawl,
    Uptalk,
    BreathPause,
}

/// Lifecycle state of an enrolled signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    Active,
    Revoked,
}

// ---------------------------------------------------------------------------
// Generation scoring targets
// ---------------------------------------------------------------------------

/// Perceptual parameter targets for one voice type, on the 0-100 scales the
/// scorer produces. Product-tuned constants.
#[derive(Debug, Clone, Copy)]
pub struct VoiceTypeTargets {
    pub weight: f64,
    pub pitch_variance: f64,
    pub presence: f64,
}

impl VoiceType {
    /// Target parameter profile used by generation verification.
    pub fn targets(self) -> VoiceTypeTargets {
        match self {
            // Authoritative, high presence
            Self::Command => VoiceTypeTargets {
                weight: 80.0,
                pitch_variance: 20.0,
                presence: 80.0,
            },
            // Warm, soft, close proximity
            Self::Intimate => VoiceTypeTargets {
                weight: 20.0,
                pitch_variance: 50.0,
                presence: 50.0,
            },
            // Engaging, dynamic range
            Self::Storyteller => VoiceTypeTargets {
                weight: 50.0,
                pitch_variance: 80.0,
                presence: 50.0,
            },
            // Breathy, low volume
            Self::Whisper => VoiceTypeTargets {
                weight: 20.0,
                pitch_variance: 20.0,
                presence: 20.0,
            },
            // Pressed, fast, insistent
            Self::Urgent => VoiceTypeTargets {
                weight: 60.0,
                pitch_variance: 70.0,
                presence: 85.0,
            },
        }
    }
}

/// Sweet-spot component targets for one perceptual profile.
#[derive(Debug, Clone, Copy)]
pub struct ProfileTargets {
    pub clarity: f64,
    pub warmth: f64,
    pub presence: f64,
    pub smoothness: f64,
}

impl PerceptualProfile {
    /// Component targets used by generation verification.
    pub fn targets(self) -> ProfileTargets {
        match self {
            Self::Podcast => ProfileTargets {
                clarity: 85.0,
                warmth: 60.0,
                presence: 75.0,
                smoothness: 70.0,
            },
            Self::Warm => ProfileTargets {
                clarity: 65.0,
                warmth: 85.0,
                presence: 55.0,
                smoothness: 80.0,
            },
            Self::Broadcast => ProfileTargets {
                clarity: 80.0,
                warmth: 55.0,
                presence: 90.0,
                smoothness: 65.0,
            },
            Self::Asmr => ProfileTargets {
                clarity: 50.0,
                warmth: 80.0,
                presence: 30.0,
                smoothness: 90.0,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Formant frequencies in Hz.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FormantsPayload {
    pub f1: f64,
    pub f2: f64,
    pub f3: f64,
    pub f4: f64,
}

/// Raw acoustic features attached to an analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesPayload {
    /// Hz.
    pub spectral_centroid: f64,
    /// Hz (85% energy point).
    pub spectral_rolloff: Option<f64>,
    /// dB.
    pub hnr: Option<f64>,
    /// dB.
    pub cpp: Option<f64>,
    /// dB.
    pub h1_h2: Option<f64>,
    /// Hz. `null` when no voiced frames were found.
    pub f0_mean: Option<f64>,
    /// [min, max] Hz. `null` when no voiced frames were found.
    pub f0_range: Option<[f64; 2]>,
    pub formants: FormantsPayload,
    /// 13 coefficients, frame means.
    pub mfccs: Option<Vec<f64>>,
    /// Percent.
    pub jitter: Option<f64>,
    /// Percent.
    pub shimmer: Option<f64>,
}

/// Full vocal analysis for one uploaded sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub filename: String,
    pub audio_type: AudioType,
    pub prompt_type: PromptType,
    pub timbre: TimbreScores,
    pub weight: WeightScores,
    pub placement: PlacementScores,
    pub sweet_spot: SweetSpotScore,
    pub features: FeaturesPayload,
    /// Set when scoring fell back to spectral-only mappings (unvoiced input).
    pub low_confidence: bool,
    pub analyzed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Biometrics
// ---------------------------------------------------------------------------

/// Result of a completed enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentResponse {
    pub signature_id: String,
    pub name: String,
    pub samples_count: usize,
    pub quality_score: f64,
    pub has_spoken_centroid: bool,
    pub has_singing_centroid: bool,
    pub status: SignatureStatus,
}

/// One row of the signature listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub id: String,
    pub name: String,
    pub enrolled_at: DateTime<Utc>,
    pub samples_count: usize,
    pub quality_score: f64,
    pub status: SignatureStatus,
    pub has_spoken_centroid: bool,
    pub has_singing_centroid: bool,
}

/// Outcome of one verification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResponse {
    /// `false` is a normal outcome, never an error.
    #[serde(rename = "match")]
    pub is_match: bool,
    /// Percent. Reported even on no-match (best candidate's confidence).
    pub confidence: f64,
    pub matched_signature_id: Option<String>,
    pub matched_signature_name: Option<String>,
    pub anti_spoofing: AntiSpoofingResult,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

fn default_variance() -> f64 {
    50.0
}

fn default_expressiveness() -> f64 {
    70.0
}

/// Generation request passed through to the external TTS provider. The
/// engine's only obligation is scoring the provider's output against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub text: String,
    pub signature_id: String,
    pub voice_type: VoiceType,
    #[serde(default)]
    pub inflections: Vec<Inflection>,
    pub perceptual_profile: PerceptualProfile,
    #[serde(default = "default_variance")]
    pub pitch_variance: f64,
    #[serde(default = "default_variance")]
    pub speaking_rate: f64,
    #[serde(default = "default_expressiveness")]
    pub expressiveness: f64,
}

/// Verification scores attached to a generation result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerificationScores {
    pub identity_match: f64,
    pub voice_type_accuracy: f64,
    pub perceptual_match: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_as_frontend_literals() {
        assert_eq!(serde_json::to_value(AudioType::Spoken).unwrap(), "spoken");
        assert_eq!(serde_json::to_value(AudioType::Sung).unwrap(), "sung");
        assert_eq!(
            serde_json::to_value(PromptType::Sustained).unwrap(),
            "sustained"
        );
        assert_eq!(
            serde_json::to_value(VoiceType::Storyteller).unwrap(),
            "storyteller"
        );
        assert_eq!(serde_json::to_value(PerceptualProfile::Asmr).unwrap(), "asmr");
        assert_eq!(
            serde_json::to_value(Inflection::BreathPause).unwrap(),
            "breath_pause"
        );
        assert_eq!(
            serde_json::to_value(SignatureStatus::Active).unwrap(),
            "active"
        );
    }

    #[test]
    fn verification_response_uses_match_key() {
        let resp = VerificationResponse {
            is_match: true,
            confidence: 94.5,
            matched_signature_id: Some("sig_1".into()),
            matched_signature_name: Some("Primary Voice".into()),
            anti_spoofing: AntiSpoofingResult {
                replay_detected: false,
                ai_generated: false,
                liveness_verified: true,
            },
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["match"], true);
        assert_eq!(json["confidence"], 94.5);
        assert_eq!(json["anti_spoofing"]["liveness_verified"], true);
        assert!(json.get("is_match").is_none());
    }

    #[test]
    fn features_null_fields_for_unvoiced() {
        let payload = FeaturesPayload {
            spectral_centroid: 2450.0,
            spectral_rolloff: Some(4500.0),
            hnr: None,
            cpp: Some(12.3),
            h1_h2: None,
            f0_mean: None,
            f0_range: None,
            formants: FormantsPayload {
                f1: 520.0,
                f2: 1680.0,
                f3: 2580.0,
                f4: 3450.0,
            },
            mfccs: None,
            jitter: None,
            shimmer: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["hnr"].is_null());
        assert!(json["f0_range"].is_null());
        assert_eq!(json["formants"]["f2"], 1680.0);
    }

    #[test]
    fn generation_request_fills_defaults() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{
                "text": "hello",
                "signature_id": "sig_1",
                "voice_type": "command",
                "perceptual_profile": "podcast"
            }"#,
        )
        .unwrap();
        assert_eq!(req.pitch_variance, 50.0);
        assert_eq!(req.speaking_rate, 50.0);
        assert_eq!(req.expressiveness, 70.0);
        assert!(req.inflections.is_empty());
    }

    #[test]
    fn f0_range_serializes_as_pair() {
        let payload = FeaturesPayload {
            spectral_centroid: 2000.0,
            spectral_rolloff: None,
            hnr: Some(18.0),
            cpp: Some(12.0),
            h1_h2: Some(4.0),
            f0_mean: Some(185.0),
            f0_range: Some([145.0, 245.0]),
            formants: FormantsPayload {
                f1: 500.0,
                f2: 1500.0,
                f3: 2500.0,
                f4: 3500.0,
            },
            mfccs: Some(vec![0.0; 13]),
            jitter: Some(0.5),
            shimmer: Some(3.2),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["f0_range"][0], 145.0);
        assert_eq!(json["f0_range"][1], 245.0);
        assert_eq!(json["mfccs"].as_array().unwrap().len(), 13);
    }
}
