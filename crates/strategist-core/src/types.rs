//! Core types shared across the detection cascade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::confidence::{ConfidenceExplanation, ConfidenceLevel, ConfidenceSummary};

/// A simplification strategy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyCode {
    /// Lexical simplification (word substitution)
    #[serde(rename = "SL+")]
    LexicalSimplification,

    /// Sentence fragmentation
    #[serde(rename = "RP+")]
    Fragmentation,

    /// Global rewriting
    #[serde(rename = "RF+")]
    GlobalRewriting,

    /// Modulation: perspective or voice shift
    #[serde(rename = "MOD+")]
    Modulation,

    /// Omission of source content
    #[serde(rename = "OM+")]
    Omission,

    /// Semantic deviation (manual annotation only)
    #[serde(rename = "PRO+")]
    SemanticDeviation,

    /// Explicitation / expansion
    #[serde(rename = "EXP+")]
    Explicitation,
}

impl StrategyCode {
    /// Every known code, in canonical order.
    pub const ALL: [StrategyCode; 7] = [
        StrategyCode::LexicalSimplification,
        StrategyCode::Fragmentation,
        StrategyCode::GlobalRewriting,
        StrategyCode::Modulation,
        StrategyCode::Omission,
        StrategyCode::SemanticDeviation,
        StrategyCode::Explicitation,
    ];

    /// The tag as written by annotators.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyCode::LexicalSimplification => "SL+",
            StrategyCode::Fragmentation => "RP+",
            StrategyCode::GlobalRewriting => "RF+",
            StrategyCode::Modulation => "MOD+",
            StrategyCode::Omission => "OM+",
            StrategyCode::SemanticDeviation => "PRO+",
            StrategyCode::Explicitation => "EXP+",
        }
    }

    /// Short human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            StrategyCode::LexicalSimplification => "lexical simplification",
            StrategyCode::Fragmentation => "sentence fragmentation",
            StrategyCode::GlobalRewriting => "global rewriting",
            StrategyCode::Modulation => "modulation / perspective shift",
            StrategyCode::Omission => "omission",
            StrategyCode::SemanticDeviation => "semantic deviation",
            StrategyCode::Explicitation => "explicitation",
        }
    }
}

impl fmt::Display for StrategyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a tag is not a known strategy code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown strategy code: {0}")]
pub struct UnknownStrategyCode(pub String);

impl FromStr for StrategyCode {
    type Err = UnknownStrategyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        StrategyCode::ALL
            .iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| UnknownStrategyCode(trimmed.to_string()))
    }
}

/// Which cascade stage produced a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Text level
    Macro,
    /// Sentence level
    Meso,
    /// Word / phrase level
    Micro,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Macro => f.write_str("macro"),
            Stage::Meso => f.write_str("meso"),
            Stage::Micro => f.write_str("micro"),
        }
    }
}

/// How much of the text pair the cascade analyzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Only the first N sentences of each text
    #[default]
    Performance,
    /// The full text, regardless of length
    Complete,
}

impl AnalysisMode {
    pub fn is_complete(&self) -> bool {
        matches!(self, AnalysisMode::Complete)
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "performance" => Ok(AnalysisMode::Performance),
            "complete" => Ok(AnalysisMode::Complete),
            other => Err(format!("unknown analysis mode '{}'", other)),
        }
    }
}

/// Byte range into one of the two texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice the range out of `text`, or an empty string if it does not fit.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start..self.end).unwrap_or("")
    }
}

/// Names of the numeric features the confidence engine can weight.
pub const FEATURE_NAMES: [&str; 11] = [
    "length_ratio",
    "word_count_ratio",
    "sentence_count_ratio",
    "avg_word_length_ratio",
    "semantic_similarity",
    "lexical_overlap",
    "complexity_reduction",
    "voice_change_score",
    "explicitness_score",
    "structure_change_score",
    "pronoun_reduction_score",
];

/// Numeric description of how the target differs from the source.
///
/// Built once per text pair by the [`FeatureExtractor`](crate::FeatureExtractor)
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyFeatures {
    pub length_ratio: f64,
    pub word_count_ratio: f64,
    pub sentence_count_ratio: f64,
    pub avg_word_length_ratio: f64,
    pub semantic_similarity: f64,
    pub lexical_overlap: f64,
    pub complexity_reduction: f64,
    pub voice_change_score: f64,
    pub explicitness_score: f64,
    pub structure_change_score: f64,
    pub pronoun_reduction_score: f64,

    /// Byte offsets in the source where sentences lost their counterpart
    pub strategy_positions: Vec<usize>,

    /// No similarity capability was available; `semantic_similarity` is 0.0
    #[serde(default)]
    pub semantic_degraded: bool,

    /// A parser capability produced the voice and pronoun features
    #[serde(default)]
    pub parser_available: bool,
}

impl StrategyFeatures {
    /// Feature vector for inputs that cannot be compared (blank on either side).
    pub fn neutral() -> Self {
        Self {
            length_ratio: 1.0,
            word_count_ratio: 1.0,
            sentence_count_ratio: 1.0,
            avg_word_length_ratio: 1.0,
            semantic_similarity: 0.0,
            lexical_overlap: 0.0,
            complexity_reduction: 0.0,
            voice_change_score: 0.0,
            explicitness_score: 0.0,
            structure_change_score: 0.0,
            pronoun_reduction_score: 0.0,
            strategy_positions: Vec::new(),
            semantic_degraded: false,
            parser_available: false,
        }
    }

    /// Raw value of a named feature.
    pub fn value(&self, name: &str) -> Option<f64> {
        let value = match name {
            "length_ratio" => self.length_ratio,
            "word_count_ratio" => self.word_count_ratio,
            "sentence_count_ratio" => self.sentence_count_ratio,
            "avg_word_length_ratio" => self.avg_word_length_ratio,
            "semantic_similarity" => self.semantic_similarity,
            "lexical_overlap" => self.lexical_overlap,
            "complexity_reduction" => self.complexity_reduction,
            "voice_change_score" => self.voice_change_score,
            "explicitness_score" => self.explicitness_score,
            "structure_change_score" => self.structure_change_score,
            "pronoun_reduction_score" => self.pronoun_reduction_score,
            _ => return None,
        };
        Some(value)
    }

    /// A named feature mapped into a `[0, 1]` transformation signal.
    ///
    /// Higher always means "more evidence of a transformation", except for
    /// `semantic_similarity`, where higher means more meaning preserved.
    /// Ratios become the size of the reduction (or growth, for sentences),
    /// overlap becomes lexical change.
    pub fn signal(&self, name: &str) -> Option<f64> {
        let raw = self.value(name)?;
        let signal = match name {
            "length_ratio" | "word_count_ratio" => 1.0 - raw,
            "avg_word_length_ratio" => (1.0 - raw) * 2.0,
            "sentence_count_ratio" => raw - 1.0,
            "lexical_overlap" => 1.0 - raw,
            _ => raw,
        };
        Some(if signal.is_finite() { signal.clamp(0.0, 1.0) } else { 0.0 })
    }

    /// Fraction of source words removed (negative when the target expands).
    pub fn word_reduction(&self) -> f64 {
        1.0 - self.word_count_ratio
    }
}

impl Default for StrategyFeatures {
    fn default() -> Self {
        Self::neutral()
    }
}

/// One strategy detection after confidence scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedStrategy {
    pub strategy_code: StrategyCode,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub examples: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_range: Option<TextRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_range: Option<TextRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_sentence: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_sentences: Vec<usize>,
    pub stage: Stage,
    pub explanation: ConfidenceExplanation,
}

/// Full result of one detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Accepted strategies, in cascade order
    pub strategies: Vec<DetectedStrategy>,

    /// Aggregate view over the accepted strategies
    pub summary: ConfidenceSummary,

    /// Features the cascade ran on
    pub features: StrategyFeatures,

    /// Mode the cascade ran in
    pub mode: AnalysisMode,

    /// Number of source sentences analyzed
    pub source_sentences_analyzed: usize,

    /// Number of target sentences analyzed
    pub target_sentences_analyzed: usize,

    /// Degraded capabilities and reduction-ratio warnings
    pub warnings: Vec<String>,

    /// When the detection ran
    pub analyzed_at: DateTime<Utc>,
}
