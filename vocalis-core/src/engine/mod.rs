//! `VocalisEngine` — top-level request orchestrator.
//!
//! ## Per-request data flow
//!
//! ```text
//! analyze:  ingest ─► features ─► perceptual score ─► AnalysisResponse
//! enroll:   ingest ─► embed   (per sample) ─► aggregate ─► store
//! verify:   ingest ─┬► embed ──────────┐
//!                   └► anti-spoofing ──┴► match + fail-closed policy
//! generation score: ingest ─┬► features ─► score ─┐
//!                           └► embed ─────────────┴► VerificationScores
//! ```
//!
//! CPU-bound stages run on `spawn_blocking` under a per-stage timeout;
//! stages with no mutual data dependency run concurrently. Requests are
//! independent — the only shared state is the read-mostly signature store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::antispoof::{self, AntiSpoofingResult, SpoofCheck};
use crate::api::{
    AnalysisResponse, AudioType, EnrollmentResponse, GenerationRequest, PromptType,
    SignatureSummary, VerificationResponse, VerificationScores,
};
use crate::audio::{self, AudioSample, IngestConfig};
use crate::cancel::CancelFlag;
use crate::embedding::{EmbedderHandle, SpeakerEmbedding};
use crate::error::{Result, VocalisError};
use crate::features::{self, AcousticFeatures};
use crate::scoring;
use crate::signature::{
    matcher::{self, MatchConfig, VerificationAttempt},
    SignatureStore, VoiceSignature, MIN_ENROLLMENT_SAMPLES,
};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ingest parameters (analysis rate, trimming, loudness target).
    pub ingest: IngestConfig,
    /// Sample rate the embedding model expects (Hz). When it differs from
    /// the analysis rate, the embedding stage works on a second resampled
    /// view of the ingested audio. Default: 16000.
    pub embedding_sample_rate: u32,
    /// Minimum post-trim duration for analysis and verification probes (s).
    /// Default: 0.5 (the recorder's minimum take).
    pub min_analysis_secs: f32,
    /// Minimum post-trim duration per enrollment sample (s). Default: 3.0.
    pub min_enrollment_secs: f32,
    /// Matching thresholds.
    pub matching: MatchConfig,
    /// Upper bound per CPU-bound stage. Default: 5 s.
    pub stage_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            embedding_sample_rate: 16_000,
            min_analysis_secs: 0.5,
            min_enrollment_secs: 3.0,
            matching: MatchConfig::default(),
            stage_timeout: Duration::from_secs(5),
        }
    }
}

/// One uploaded audio payload plus its declared metadata.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub filename: Option<String>,
    /// Declared mode; routes pitch ranges and sub-centroid selection.
    pub audio_type: AudioType,
}

impl AudioInput {
    pub fn wav(bytes: Vec<u8>, audio_type: AudioType) -> Self {
        Self {
            bytes,
            mime: "audio/wav".into(),
            filename: None,
            audio_type,
        }
    }
}

/// The top-level engine handle.
///
/// `VocalisEngine` is `Send + Sync`; wrap in `Arc` to share between request
/// handlers. No per-request state lives on the engine.
pub struct VocalisEngine {
    config: EngineConfig,
    embedder: EmbedderHandle,
    store: SignatureStore,
    spoof_checks: Arc<Vec<Box<dyn SpoofCheck>>>,
}

impl VocalisEngine {
    /// Create an engine with the default anti-spoofing strategy set.
    pub fn new(config: EngineConfig, embedder: EmbedderHandle) -> Self {
        Self {
            config,
            embedder,
            store: SignatureStore::new(),
            spoof_checks: Arc::new(antispoof::default_checks()),
        }
    }

    /// Replace the anti-spoofing strategies (heuristic upgrades, test
    /// doubles). The fail-closed policy itself is not configurable.
    pub fn with_spoof_checks(mut self, checks: Vec<Box<dyn SpoofCheck>>) -> Self {
        self.spoof_checks = Arc::new(checks);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Analysis ─────────────────────────────────────────────────────────

    /// Full vocal analysis of one sample.
    pub async fn analyze(
        &self,
        input: AudioInput,
        prompt_type: PromptType,
    ) -> Result<AnalysisResponse> {
        self.analyze_with_cancel(input, prompt_type, CancelFlag::new())
            .await
    }

    /// `analyze` with an external cancellation flag (caller disconnect).
    pub async fn analyze_with_cancel(
        &self,
        input: AudioInput,
        prompt_type: PromptType,
        cancel: CancelFlag,
    ) -> Result<AnalysisResponse> {
        let filename = input
            .filename
            .clone()
            .unwrap_or_else(|| "upload.wav".into());
        let audio_type = input.audio_type;

        let sample = self
            .ingest_stage(input, self.config.min_analysis_secs)
            .await?;
        let features = self.features_stage(&sample, audio_type, &cancel).await?;
        let score = scoring::score(&features);

        info!(
            filename = filename.as_str(),
            total = score.sweet_spot.total,
            low_confidence = score.low_confidence,
            "analysis complete"
        );

        Ok(AnalysisResponse {
            filename,
            audio_type,
            prompt_type,
            timbre: score.timbre,
            weight: score.weight,
            placement: score.placement,
            sweet_spot: score.sweet_spot,
            features: features.to_payload(),
            low_confidence: score.low_confidence,
            analyzed_at: Utc::now(),
        })
    }

    // ── Enrollment ───────────────────────────────────────────────────────

    /// Enroll a voice signature from ≥ 3 samples.
    ///
    /// Samples that fail ingest (unsupported payload, too short after
    /// trimming) are filtered out, not fatal; enrollment fails with
    /// `InsufficientSamples` only when fewer than 3 valid samples remain.
    pub async fn enroll(&self, name: &str, inputs: Vec<AudioInput>) -> Result<EnrollmentResponse> {
        self.enroll_with_cancel(name, inputs, CancelFlag::new())
            .await
    }

    pub async fn enroll_with_cancel(
        &self,
        name: &str,
        inputs: Vec<AudioInput>,
        cancel: CancelFlag,
    ) -> Result<EnrollmentResponse> {
        let submitted = inputs.len();
        let mut embeddings: Vec<SpeakerEmbedding> = Vec::with_capacity(submitted);

        for input in inputs {
            let mode = input.audio_type;
            let sample = match self
                .ingest_stage(input, self.config.min_enrollment_secs)
                .await
            {
                Ok(sample) => sample,
                Err(e @ (VocalisError::UnsupportedFormat { .. }
                | VocalisError::InsufficientAudio { .. })) => {
                    warn!(error = %e, "enrollment sample rejected");
                    continue;
                }
                Err(e) => return Err(e),
            };
            embeddings.push(self.embed_stage(&sample, mode, &cancel).await?);
        }

        if embeddings.len() < MIN_ENROLLMENT_SAMPLES {
            return Err(VocalisError::InsufficientSamples {
                valid: embeddings.len(),
                required: MIN_ENROLLMENT_SAMPLES,
            });
        }

        let samples_count = embeddings.len();
        let signature = VoiceSignature::enroll(name, embeddings)?;
        let response = EnrollmentResponse {
            signature_id: signature.id.clone(),
            name: signature.name.clone(),
            samples_count,
            quality_score: signature.quality_score,
            has_spoken_centroid: signature.spoken_centroid.is_some(),
            has_singing_centroid: signature.singing_centroid.is_some(),
            status: signature.status,
        };
        self.store.insert(signature);

        info!(
            signature_id = response.signature_id.as_str(),
            submitted,
            valid = samples_count,
            quality = response.quality_score,
            "enrollment complete"
        );
        Ok(response)
    }

    // ── Verification ─────────────────────────────────────────────────────

    /// Verify a probe against one signature (1:1, `target` given) or every
    /// active signature (1:N).
    ///
    /// "No match" is a normal response. Fraud signals from anti-spoofing
    /// force `match: false` regardless of similarity.
    pub async fn verify(
        &self,
        input: AudioInput,
        target: Option<&str>,
    ) -> Result<VerificationResponse> {
        self.verify_with_cancel(input, target, CancelFlag::new())
            .await
    }

    pub async fn verify_with_cancel(
        &self,
        input: AudioInput,
        target: Option<&str>,
        cancel: CancelFlag,
    ) -> Result<VerificationResponse> {
        let mode = input.audio_type;

        // Resolve candidates up front so an unknown target id fails before
        // any signal processing runs.
        let candidates = match target {
            Some(id) => vec![self.store.get(id)?],
            None => self.store.active(),
        };

        let sample = self
            .ingest_stage(input, self.config.min_analysis_secs)
            .await?;

        // Embedding and anti-spoofing depend only on the ingested waveform —
        // run them concurrently.
        let (probe, anti_spoofing) = tokio::try_join!(
            self.embed_stage(&sample, mode, &cancel),
            self.spoof_stage(&sample, &cancel),
        )?;

        let outcome = matcher::match_probe(
            &probe.vector,
            &candidates,
            mode,
            &self.config.matching,
        )?;

        // Fail closed: similarity alone is never sufficient.
        let accepted = if anti_spoofing.fraud_detected() {
            warn!(
                replay = anti_spoofing.replay_detected,
                ai = anti_spoofing.ai_generated,
                similarity = outcome.similarity,
                "verification rejected by anti-spoofing policy"
            );
            None
        } else {
            outcome.matched
        };

        let attempt = VerificationAttempt {
            matched_signature_id: accepted.as_ref().map(|(id, _)| id.clone()),
            confidence: outcome.confidence,
            anti_spoofing,
            timestamp: Utc::now(),
        };
        info!(
            matched = attempt.matched_signature_id.as_deref().unwrap_or("-"),
            confidence = attempt.confidence,
            liveness = attempt.anti_spoofing.liveness_verified,
            "verification attempt"
        );

        let (matched_signature_id, matched_signature_name) = match accepted {
            Some((id, name)) => (Some(id), Some(name)),
            None => (None, None),
        };
        Ok(VerificationResponse {
            is_match: matched_signature_id.is_some(),
            confidence: outcome.confidence,
            matched_signature_id,
            matched_signature_name,
            anti_spoofing,
        })
    }

    // ── Signature management ─────────────────────────────────────────────

    /// List enrolled signatures.
    pub fn signatures(&self) -> Vec<SignatureSummary> {
        self.store.summaries()
    }

    /// Irreversibly delete a signature (user-requested erasure). Synchronous:
    /// once this returns, no probe can match the removed signature.
    pub fn delete_signature(&self, id: &str) -> Result<()> {
        self.store.delete(id)
    }

    // ── Generation scoring ───────────────────────────────────────────────

    /// Score externally generated audio against the conditioning request:
    /// identity (embedding vs. signature centroid), voice-type accuracy and
    /// perceptual-profile match.
    pub async fn score_generation(
        &self,
        generated: AudioInput,
        request: &GenerationRequest,
    ) -> Result<VerificationScores> {
        let cancel = CancelFlag::new();
        let signature = self.store.get(&request.signature_id)?;

        let mode = generated.audio_type;
        let sample = self
            .ingest_stage(generated, self.config.min_analysis_secs)
            .await?;

        let (probe, features) = tokio::try_join!(
            self.embed_stage(&sample, mode, &cancel),
            self.features_stage(&sample, mode, &cancel),
        )?;

        let identity_match = match signature.centroid_for(mode) {
            Some(centroid) => {
                matcher::confidence_percent(matcher::cosine_similarity(&probe.vector, centroid)?)
            }
            None => 0.0,
        };

        let score = scoring::score(&features);
        let voice_type_accuracy =
            voice_type_accuracy(&score, &features, request.voice_type.targets());
        let perceptual_match = perceptual_match(&score, request.perceptual_profile.targets());

        Ok(VerificationScores {
            identity_match,
            voice_type_accuracy,
            perceptual_match,
        })
    }

    // ── Stage plumbing ───────────────────────────────────────────────────

    async fn ingest_stage(&self, input: AudioInput, min_secs: f32) -> Result<Arc<AudioSample>> {
        let cfg = self.config.ingest.clone();
        let sample = self
            .run_stage("ingest", move || {
                audio::ingest(&input.bytes, &input.mime, &cfg, min_secs)
            })
            .await?;
        Ok(Arc::new(sample))
    }

    async fn features_stage(
        &self,
        sample: &Arc<AudioSample>,
        audio_type: AudioType,
        cancel: &CancelFlag,
    ) -> Result<AcousticFeatures> {
        let sample = Arc::clone(sample);
        let cancel = cancel.clone();
        self.run_stage("features", move || {
            features::extract(&sample, audio_type, &cancel)
        })
        .await
    }

    async fn embed_stage(
        &self,
        sample: &Arc<AudioSample>,
        mode: AudioType,
        cancel: &CancelFlag,
    ) -> Result<SpeakerEmbedding> {
        let embedder = self.embedder.clone();
        let sample = Arc::clone(sample);
        let cancel = cancel.clone();
        let target_rate = self.config.embedding_sample_rate;
        self.run_stage("embedding", move || {
            // Second resampled view when the model rate differs from the
            // analysis rate.
            if sample.sample_rate == target_rate {
                embedder.extract(&sample, mode, &cancel)
            } else {
                let view = AudioSample::new(
                    audio::resample::resample_buffer(
                        &sample.samples,
                        sample.sample_rate,
                        target_rate,
                    )?,
                    target_rate,
                    sample.source_channels,
                );
                embedder.extract(&view, mode, &cancel)
            }
        })
        .await
    }

    async fn spoof_stage(
        &self,
        sample: &Arc<AudioSample>,
        cancel: &CancelFlag,
    ) -> Result<AntiSpoofingResult> {
        let checks = Arc::clone(&self.spoof_checks);
        let sample = Arc::clone(sample);
        let cancel = cancel.clone();
        self.run_stage("anti-spoofing", move || {
            antispoof::evaluate_all(&checks, &sample, &cancel)
        })
        .await
    }

    /// Run a CPU-bound closure on the blocking pool under the stage timeout.
    async fn run_stage<T, F>(&self, stage: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.config.stage_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(VocalisError::Other(anyhow::anyhow!(
                "{stage} stage task failed: {join_err}"
            ))),
            Err(_) => Err(VocalisError::ProcessingTimeout { stage }),
        }
    }
}

/// Voice-type accuracy: 100 minus the mean deviation of the measured weight,
/// pitch variance and presence from the voice type's target profile.
fn voice_type_accuracy(
    score: &scoring::PerceptualScore,
    features: &AcousticFeatures,
    targets: crate::api::responses::VoiceTypeTargets,
) -> f64 {
    let measured_variance = pitch_variance_percent(features);
    let deviation = ((score.weight.weight - targets.weight).abs()
        + (measured_variance - targets.pitch_variance).abs()
        + (score.sweet_spot.presence - targets.presence).abs())
        / 3.0;
    (100.0 - deviation).clamp(0.0, 100.0)
}

/// Perceptual-profile match: 100 minus the mean deviation of the sweet-spot
/// components from the profile targets.
fn perceptual_match(
    score: &scoring::PerceptualScore,
    targets: crate::api::responses::ProfileTargets,
) -> f64 {
    let s = &score.sweet_spot;
    let deviation = ((s.clarity - targets.clarity).abs()
        + (s.warmth - targets.warmth).abs()
        + (s.presence - targets.presence).abs()
        + (s.smoothness - targets.smoothness).abs())
        / 4.0;
    (100.0 - deviation).clamp(0.0, 100.0)
}

/// Measured pitch variance on the 0-100 scale: F0 range in semitones
/// normalized against a 24-semitone (two octave) span. Neutral 50 when the
/// input is unvoiced.
fn pitch_variance_percent(features: &AcousticFeatures) -> f64 {
    match features.f0_range {
        Some([min, max]) if min > 0.0 && max > min => {
            let semitones = 12.0 * (max / min).log2();
            (semitones / 24.0 * 100.0).clamp(0.0, 100.0)
        }
        _ => 50.0,
    }
}
