//! Detector configuration.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Builtin and literal-like names that are never replaced by placeholders.
///
/// `True`/`False`/`None` parse as constants rather than names, but they stay
/// in the set so a reserved-name check is always safe to apply to any
/// identifier the normalizer encounters.
static DEFAULT_RESERVED: Lazy<HashSet<String>> = Lazy::new(|| {
    let mut set = HashSet::new();
    for name in &[
        "True", "False", "None", "print", "len", "range", "int", "str", "list", "dict",
    ] {
        set.insert(name.to_string());
    }
    set
});

/// Configuration for the detection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Line-overlap ratio above which a candidate is flagged (strict `>`).
    pub similarity_threshold: f64,
    /// Names excluded from identifier normalization.
    pub reserved_names: HashSet<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.9,
            reserved_names: DEFAULT_RESERVED.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reserved_names_cover_common_builtins() {
        let config = DetectorConfig::default();
        for name in &["print", "len", "range", "None"] {
            assert!(config.reserved_names.contains(*name), "missing {}", name);
        }
        assert!(!config.reserved_names.contains("solve"));
    }

    #[test]
    fn default_threshold_is_strict_ninety_percent() {
        assert_eq!(DetectorConfig::default().similarity_threshold, 0.9);
    }
}
