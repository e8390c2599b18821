//! Canonical-text similarity scoring.
//!
//! Compares two canonicalized sources: exact equality first, then overlap of
//! distinct lines, `|common| / max(|reference|, |candidate|)`. Taking the
//! larger set as the denominator penalizes added or removed lines on either
//! side. Line order and duplicate counts are ignored, which keeps the metric
//! robust to statement reordering but understates similarity for very short
//! snippets with few distinct lines.

use std::collections::HashSet;

use crate::types::Verdict;

/// Compare two canonical texts and produce a verdict.
///
/// The threshold is strict: a ratio exactly at `threshold` is not flagged.
pub fn compare_canonical(reference: &str, candidate: &str, threshold: f64) -> Verdict {
    if reference == candidate {
        return Verdict {
            is_cheating: true,
            confidence: 1.0,
            explanation: "Exact match with generated reference code".to_string(),
            suspicious_patterns: vec!["Exact match".to_string()],
        };
    }

    let similarity = line_overlap(reference, candidate);

    if similarity > threshold {
        Verdict {
            is_cheating: true,
            confidence: similarity,
            explanation: format!(
                "High similarity ({:.2}) with generated reference code",
                similarity
            ),
            suspicious_patterns: vec!["High similarity".to_string()],
        }
    } else {
        Verdict {
            is_cheating: false,
            confidence: similarity,
            explanation: format!(
                "Low similarity ({:.2}) with generated reference code",
                similarity
            ),
            suspicious_patterns: Vec::new(),
        }
    }
}

fn line_overlap(reference: &str, candidate: &str) -> f64 {
    let reference_lines: HashSet<&str> = reference.lines().collect();
    let candidate_lines: HashSet<&str> = candidate.lines().collect();

    let larger = reference_lines.len().max(candidate_lines.len());
    if larger == 0 {
        return 0.0;
    }

    let common = reference_lines.intersection(&candidate_lines).count();
    common as f64 / larger as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn exact_match_is_full_confidence() {
        let text = "def func_0(arg_1):\n    return arg_1";
        let verdict = compare_canonical(text, text, 0.9);
        assert!(verdict.is_cheating);
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.suspicious_patterns, vec!["Exact match".to_string()]);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        let verdict = compare_canonical("a = 1\nb = 2", "c = 3\nd = 4", 0.9);
        assert!(!verdict.is_cheating);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.suspicious_patterns.is_empty());
    }

    #[test]
    fn ratio_exactly_at_threshold_is_not_flagged() {
        // 9 shared lines out of max(10, 10) = 0.90, strictly-greater check.
        let reference: Vec<String> = (0..10).map(|i| format!("line_{}", i)).collect();
        let mut candidate: Vec<String> = reference[..9].to_vec();
        candidate.push("something_else".to_string());

        let reference: Vec<&str> = reference.iter().map(String::as_str).collect();
        let candidate: Vec<&str> = candidate.iter().map(String::as_str).collect();

        let verdict = compare_canonical(&joined(&reference), &joined(&candidate), 0.9);
        assert!(!verdict.is_cheating);
        assert!((verdict.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn ratio_above_threshold_is_flagged() {
        // 10 shared lines out of max(10, 11) ~ 0.909.
        let reference: Vec<String> = (0..10).map(|i| format!("line_{}", i)).collect();
        let mut candidate = reference.clone();
        candidate.push("extra_line".to_string());

        let reference: Vec<&str> = reference.iter().map(String::as_str).collect();
        let candidate: Vec<&str> = candidate.iter().map(String::as_str).collect();

        let verdict = compare_canonical(&joined(&reference), &joined(&candidate), 0.9);
        assert!(verdict.is_cheating);
        assert!(verdict.confidence > 0.9);
        assert_eq!(
            verdict.suspicious_patterns,
            vec!["High similarity".to_string()]
        );
    }

    #[test]
    fn one_empty_side_scores_zero_without_division() {
        let verdict = compare_canonical("a = 1", "", 0.9);
        assert!(!verdict.is_cheating);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn duplicate_lines_count_once() {
        // Each side has one distinct line; they differ.
        let verdict = compare_canonical("x = 1\nx = 1\nx = 1", "y = 2", 0.9);
        assert_eq!(verdict.confidence, 0.0);
    }
}
