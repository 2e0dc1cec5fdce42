use thiserror::Error;

/// All errors produced by vocalis-core.
///
/// "No match" during verification is a normal result, not an error — it never
/// appears here.
#[derive(Debug, Error)]
pub enum VocalisError {
    #[error("unsupported audio format: {detail}")]
    UnsupportedFormat { detail: String },

    #[error("insufficient audio: {detail}")]
    InsufficientAudio { detail: String },

    #[error("insufficient enrollment samples: {valid} valid of {required} required")]
    InsufficientSamples { valid: usize, required: usize },

    #[error("processing timeout in {stage} stage")]
    ProcessingTimeout { stage: &'static str },

    #[error("voice signature not found: {id}")]
    SignatureNotFound { id: String },

    #[error("embedding dimension mismatch: probe has {probe} dims, signature has {stored}")]
    EmbeddingDimensionMismatch { probe: usize, stored: usize },

    #[error("request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VocalisError {
    /// Stable machine-readable kind for structured error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::InsufficientAudio { .. } => "insufficient_audio",
            Self::InsufficientSamples { .. } => "insufficient_samples",
            Self::ProcessingTimeout { .. } => "processing_timeout",
            Self::SignatureNotFound { .. } => "signature_not_found",
            Self::EmbeddingDimensionMismatch { .. } => "embedding_dimension_mismatch",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, VocalisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let err = VocalisError::InsufficientSamples {
            valid: 2,
            required: 3,
        };
        assert_eq!(err.kind(), "insufficient_samples");
        assert!(err.to_string().contains("2 valid of 3"));
    }
}
