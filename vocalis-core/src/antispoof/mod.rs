//! Anti-spoofing evaluation.
//!
//! Three independent verdicts over the same ingested sample, each produced by
//! a pluggable strategy behind the `SpoofCheck` trait:
//!
//! | Verdict | Polarity | Default strategy |
//! |---------|----------|------------------|
//! | `replay_detected` | negative (fraud signal) | `ReplayDetector` |
//! | `ai_generated` | negative (fraud signal) | `SynthesisDetector` |
//! | `liveness_verified` | positive (live evidence) | `LivenessCheck` |
//!
//! Strategies can be swapped or upgraded without touching the engine's
//! fail-closed policy: a fraud signal forces `match: false` regardless of
//! embedding similarity.

pub mod liveness;
pub mod replay;
pub mod synthesis;

pub use liveness::LivenessCheck;
pub use replay::ReplayDetector;
pub use synthesis::SynthesisDetector;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::AudioSample;
use crate::cancel::CancelFlag;
use crate::error::Result;

/// Which verdict a strategy feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoofCheckKind {
    /// Negative check: recording-of-a-recording artifacts.
    Replay,
    /// Negative check: synthesis artifacts.
    Synthesis,
    /// Positive check: evidence of a live human utterance.
    Liveness,
}

/// Contract for anti-spoofing strategies.
///
/// Implementations are stateless at evaluation time and must be deterministic
/// for identical input.
pub trait SpoofCheck: Send + Sync + 'static {
    fn kind(&self) -> SpoofCheckKind;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// `true` means: detection fired (negative checks) / liveness confirmed
    /// (positive check).
    fn evaluate(&self, sample: &AudioSample, cancel: &CancelFlag) -> Result<bool>;
}

/// The three verdicts, exactly as the frontend consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiSpoofingResult {
    pub replay_detected: bool,
    pub ai_generated: bool,
    pub liveness_verified: bool,
}

impl AntiSpoofingResult {
    /// A fraud signal that must force verification to fail closed.
    pub fn fraud_detected(&self) -> bool {
        self.replay_detected || self.ai_generated
    }
}

/// The default strategy set.
pub fn default_checks() -> Vec<Box<dyn SpoofCheck>> {
    vec![
        Box::new(ReplayDetector::default()),
        Box::new(SynthesisDetector::default()),
        Box::new(LivenessCheck::default()),
    ]
}

/// Run every configured strategy and fold the verdicts.
///
/// Multiple strategies of the same kind compose conservatively: any firing
/// negative check sets its flag, and every liveness check must confirm for
/// `liveness_verified` to hold. With no liveness strategy configured,
/// liveness stays unverified.
pub fn evaluate_all(
    checks: &[Box<dyn SpoofCheck>],
    sample: &AudioSample,
    cancel: &CancelFlag,
) -> Result<AntiSpoofingResult> {
    let mut replay_detected = false;
    let mut ai_generated = false;
    let mut liveness: Option<bool> = None;

    for check in checks {
        let verdict = check.evaluate(sample, cancel)?;
        debug!(check = check.name(), verdict, "anti-spoofing check");
        match check.kind() {
            SpoofCheckKind::Replay => replay_detected |= verdict,
            SpoofCheckKind::Synthesis => ai_generated |= verdict,
            SpoofCheckKind::Liveness => {
                liveness = Some(liveness.unwrap_or(true) && verdict);
            }
        }
    }

    Ok(AntiSpoofingResult {
        replay_detected,
        ai_generated,
        liveness_verified: liveness.unwrap_or(false),
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCheck {
        kind: SpoofCheckKind,
        verdict: bool,
    }

    impl SpoofCheck for FixedCheck {
        fn kind(&self) -> SpoofCheckKind {
            self.kind
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn evaluate(&self, _sample: &AudioSample, _cancel: &CancelFlag) -> Result<bool> {
            Ok(self.verdict)
        }
    }

    fn sample() -> AudioSample {
        AudioSample::new(vec![0.1f32; 16_000], 16_000, 1)
    }

    #[test]
    fn verdicts_fold_by_kind() {
        let checks: Vec<Box<dyn SpoofCheck>> = vec![
            Box::new(FixedCheck {
                kind: SpoofCheckKind::Replay,
                verdict: true,
            }),
            Box::new(FixedCheck {
                kind: SpoofCheckKind::Synthesis,
                verdict: false,
            }),
            Box::new(FixedCheck {
                kind: SpoofCheckKind::Liveness,
                verdict: true,
            }),
        ];
        let result = evaluate_all(&checks, &sample(), &CancelFlag::new()).unwrap();
        assert!(result.replay_detected);
        assert!(!result.ai_generated);
        assert!(result.liveness_verified);
        assert!(result.fraud_detected());
    }

    #[test]
    fn no_liveness_strategy_means_unverified() {
        let checks: Vec<Box<dyn SpoofCheck>> = vec![Box::new(FixedCheck {
            kind: SpoofCheckKind::Replay,
            verdict: false,
        })];
        let result = evaluate_all(&checks, &sample(), &CancelFlag::new()).unwrap();
        assert!(!result.liveness_verified);
        assert!(!result.fraud_detected());
    }

    #[test]
    fn any_failing_liveness_check_wins() {
        let checks: Vec<Box<dyn SpoofCheck>> = vec![
            Box::new(FixedCheck {
                kind: SpoofCheckKind::Liveness,
                verdict: true,
            }),
            Box::new(FixedCheck {
                kind: SpoofCheckKind::Liveness,
                verdict: false,
            }),
        ];
        let result = evaluate_all(&checks, &sample(), &CancelFlag::new()).unwrap();
        assert!(!result.liveness_verified);
    }
}
