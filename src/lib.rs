//! AI cheat detection core.
//!
//! Flags candidate-submitted source code as potentially copied from an AI
//! code-generation service. A reference solution is generated for the same
//! problem statement, both programs are normalized to a canonical form where
//! only structure survives (user-chosen identifiers replaced by numbered
//! placeholders, formatting and comments discarded), and the overlap of the
//! two canonical texts decides the verdict.
//!
//! ## Module structure
//!
//! - `config`: detector configuration and the reserved builtin-name set
//! - `error`: error taxonomy
//! - `types`: wire types (`CheckRequest`, `Verdict`)
//! - `normalize`: parsing and identifier normalization
//! - `render`: canonical (deterministic) rendering of normalized trees
//! - `scoring`: canonical-text similarity scoring
//! - `extract`: code extraction from noisy generated text
//! - `generator`: reference-solution generation client
//! - `detector`: the request -> verdict pipeline

pub mod config;
pub mod detector;
pub mod error;
pub mod extract;
pub mod generator;
pub mod normalize;
pub mod render;
pub mod scoring;
pub mod types;

pub use config::DetectorConfig;
pub use detector::CheatDetector;
pub use error::DetectError;
pub use generator::{GeneratorConfig, HfTextGenClient, ReferenceGenerator};
pub use types::{CheckRequest, Verdict};
