//! Wire contracts consumed by the dashboard frontend.
//!
//! Field names, nesting and units are load-bearing: the frontend deserializes
//! these shapes directly. Change nothing here without a matching frontend
//! change.

pub mod responses;

pub use responses::{
    AnalysisResponse, AudioType, EnrollmentResponse, FeaturesPayload, FormantsPayload,
    GenerationRequest, Inflection, PerceptualProfile, PromptType, SignatureStatus,
    SignatureSummary, VerificationResponse, VerificationScores, VoiceType,
};
