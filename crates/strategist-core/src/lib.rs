//! # strategist-core
//!
//! Deterministic detection of text-simplification strategies.
//!
//! Given a source text and its simplified target, this crate answers:
//! - Which simplification strategies were applied?
//! - Where in the texts did they happen?
//! - How much should we trust each detection, and why?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input and configuration always produce the same report
//! 2. **Fail-open**: A failing stage is logged and skipped, never fatal
//! 3. **Explainable**: Every score carries its factors and recommendations
//! 4. **Policy-bound**: Manual-only tags (PRO+) are never emitted automatically
//!
//! ## Pipeline
//!
//! ```text
//! features ──► macro (RF+) ──► meso (RP+ MOD+ EXP+ OM+) ──► micro (SL+) ──► confidence engine
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use strategist_core::{DetectorConfig, StrategyDetector};
//!
//! let config = DetectorConfig::from_yaml_file("strategist.yaml")?;
//! let detector = StrategyDetector::builder()
//!     .config(config)
//!     .builtin_capabilities()
//!     .build()?;
//!
//! let report = detector.detect(source, target);
//! for strategy in &report.strategies {
//!     println!("{} {:.2} {:?}", strategy.strategy_code, strategy.confidence, strategy.examples);
//! }
//! ```

pub mod cache;
pub mod capabilities;
pub mod cascade;
pub mod confidence;
pub mod config;
pub mod detector;
pub mod evidence;
pub mod features;
pub mod lexical;
pub mod salience;
pub mod spans;
pub mod stages;
pub mod text;
pub mod types;

// Re-export main types at crate root
pub use capabilities::{
    HeuristicParser, LanguageParser, LexicalSimilarity, ParsedDocument, SemanticSimilarity,
};
pub use cascade::{CascadeOrchestrator, CascadeOutcome, CascadeWindow, StageFailure};
pub use confidence::{
    ConfidenceEngine, ConfidenceExplanation, ConfidenceFactor, ConfidenceLevel, ConfidenceSummary,
    CrossValidationFeatures, EvidenceQuality, ProfileError, StrategyConfidenceProfile,
};
pub use config::{
    CascadeSettings, ConfigError, DetectorConfig, SalienceSettings, TagConfig, UserConfiguration,
};
pub use detector::{DetectorBuilder, StrategyDetector};
pub use evidence::{EvidenceBuilder, StrategyEvidence};
pub use features::FeatureExtractor;
pub use lexical::{FrequencyTable, LexicalComplexityScorer};
pub use salience::{SalienceProvider, SalienceResult};
pub use spans::{MicroSpanExtractor, Span, SpanExtractorConfig};
pub use stages::{AdaptiveThresholds, StageError, StageEvaluator, StageOutcome};
pub use types::{
    AnalysisMode, DetectedStrategy, DetectionReport, Stage, StrategyCode, StrategyFeatures,
    TextRange,
};

use thiserror::Error;

/// Errors that can occur while setting up detection
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Confidence profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Unknown salience method: {0}")]
    UnknownSalienceMethod(String),
}

/// Detect strategies in a text pair with the default configuration.
///
/// Uses the built-in heuristic parser and lexical similarity. For custom
/// policies, profiles or capabilities build a [`StrategyDetector`].
///
/// # Returns
///
/// The accepted strategies in cascade order (macro, meso, micro), each with
/// a calibrated confidence and its explanation.
pub fn detect_strategies(source: &str, target: &str) -> Result<Vec<DetectedStrategy>, DetectionError> {
    let detector = StrategyDetector::with_builtin_capabilities()?;
    Ok(detector.detect_strategies(source, target))
}
