//! Wire types consumed and produced by the detection pipeline.

use serde::{Deserialize, Serialize};

/// One detection request, as received from the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub problem_statement: String,
    pub candidate_code: String,
    pub language: String,
}

/// Outcome of one detection request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub is_cheating: bool,
    /// Similarity-derived confidence in `[0, 1]`.
    pub confidence: f64,
    pub explanation: String,
    /// Matched-pattern evidence, empty when nothing was flagged.
    pub suspicious_patterns: Vec<String>,
}

impl Verdict {
    /// Fail-open verdict: not flagged, zero confidence, no evidence.
    pub fn not_flagged(explanation: impl Into<String>) -> Self {
        Self {
            is_cheating: false,
            confidence: 0.0,
            explanation: explanation.into(),
            suspicious_patterns: Vec::new(),
        }
    }
}
