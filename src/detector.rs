//! Detection orchestrator: one request in, one verdict out.
//!
//! The pipeline is fail-open by design: generator unavailability, parse
//! failures, and every other internal fault produce a well-formed
//! not-flagged verdict instead of an error. The system never blocks or
//! penalizes a candidate because of its own failures.

use tracing::{info, warn};

use crate::config::DetectorConfig;
use crate::generator::ReferenceGenerator;
use crate::normalize;
use crate::scoring;
use crate::types::{CheckRequest, Verdict};

pub struct CheatDetector<G> {
    generator: G,
    config: DetectorConfig,
}

impl<G: ReferenceGenerator> CheatDetector<G> {
    pub fn new(generator: G, config: DetectorConfig) -> Self {
        Self { generator, config }
    }

    /// Check a request received from the service layer.
    pub async fn check(&self, request: &CheckRequest) -> Verdict {
        self.check_code(
            &request.problem_statement,
            &request.candidate_code,
            &request.language,
        )
        .await
    }

    /// Compare candidate code against a freshly generated reference solution.
    pub async fn check_code(
        &self,
        problem_statement: &str,
        candidate_code: &str,
        language: &str,
    ) -> Verdict {
        let reference = match self
            .generator
            .generate_reference(problem_statement, language)
            .await
        {
            Ok(code) => code,
            Err(e) => {
                warn!("reference generation failed: {}", e);
                return Verdict::not_flagged("Could not generate reference code for comparison");
            }
        };

        let canonical_reference = self.canonicalize_or_raw(&reference, language);
        let canonical_candidate = self.canonicalize_or_raw(candidate_code, language);

        let verdict = scoring::compare_canonical(
            &canonical_reference,
            &canonical_candidate,
            self.config.similarity_threshold,
        );

        info!(
            is_cheating = verdict.is_cheating,
            confidence = verdict.confidence,
            "cheat check complete"
        );
        verdict
    }

    /// Canonicalize a source, falling back to the unmodified text when no
    /// structural comparison is possible for it.
    fn canonicalize_or_raw(&self, source: &str, language: &str) -> String {
        if !language.eq_ignore_ascii_case("python") {
            return source.to_string();
        }
        match normalize::canonicalize(source, &self.config.reserved_names) {
            Ok(text) => text,
            Err(e) => {
                warn!("normalization failed, comparing raw text: {}", e);
                source.to_string()
            }
        }
    }
}
