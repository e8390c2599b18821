use thiserror::Error;

/// Failures the detection pipeline can hit internally.
///
/// Every variant is recoverable at the orchestrator boundary: parse failures
/// fall back to unnormalized comparison, generation failures produce a
/// fail-open (not flagged) verdict. Nothing propagates to callers of
/// [`crate::CheatDetector::check_code`].
#[derive(Debug, Error)]
pub enum DetectError {
    /// Source text is not syntactically valid for its declared language.
    #[error("Failed to parse source code: {0}")]
    Parse(String),

    /// No token configured, all models exhausted, or the service refused.
    #[error("Reference generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The generated text contained no recognizable code.
    #[error("No extractable code in generated text")]
    ExtractionFailure,

    /// Transport-level failure talking to the generation service.
    #[error("Generation request failed: {0}")]
    Http(#[from] reqwest::Error),
}
