//! Stage evaluators of the detection cascade.
//!
//! Each stage looks at the text pair at one granularity:
//! - **Macro**: the whole text (global rewriting)
//! - **Meso**: sentences (fragmentation, modulation, explicitation, omission)
//! - **Micro**: words and phrases inside aligned sentences (lexical substitution)
//!
//! Stages only produce raw evidence. Calibration happens in the
//! [`ConfidenceEngine`](crate::ConfidenceEngine).

mod macro_level;
mod meso_level;
mod micro_level;

pub use macro_level::{MacroEvaluator, DEFAULT_EARLY_EXIT_CONFIDENCE};
pub use meso_level::{MesoEvaluator, DEFAULT_COMPLETE_MICRO_SENTENCE_LIMIT};
pub use micro_level::MicroEvaluator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evidence::StrategyEvidence;
use crate::features::DEFAULT_ALIGNMENT_THRESHOLD;
use crate::text::{self, SentenceAlignment};
use crate::types::{Stage, StrategyFeatures, TextRange};

/// Errors raised by a stage evaluator.
///
/// The orchestrator never propagates these: a failed stage contributes no
/// evidence and the cascade moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("{stage} stage received invalid thresholds: {reason}")]
    InvalidThresholds { stage: Stage, reason: String },

    #[error("{stage} stage evaluation failed: {reason}")]
    EvaluationFailed { stage: Stage, reason: String },
}

/// What a stage found and whether later stages should run.
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    pub evidence: Vec<StrategyEvidence>,
    pub should_continue: bool,
}

impl StageOutcome {
    pub fn proceed(evidence: Vec<StrategyEvidence>) -> Self {
        Self {
            evidence,
            should_continue: true,
        }
    }

    pub fn stop(evidence: Vec<StrategyEvidence>) -> Self {
        Self {
            evidence,
            should_continue: false,
        }
    }
}

/// One level of the cascade.
pub trait StageEvaluator: Send + Sync {
    /// Which stage this is.
    fn stage(&self) -> Stage;

    /// Evaluate a text pair.
    ///
    /// `thresholds` falls back to [`AdaptiveThresholds::default`] when absent.
    fn evaluate(
        &self,
        features: &StrategyFeatures,
        source: &str,
        target: &str,
        thresholds: Option<&AdaptiveThresholds>,
        complete_analysis_mode: bool,
    ) -> Result<StageOutcome, StageError>;
}

/// Decision thresholds shared by the stage evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveThresholds {
    /// Containment a target sentence needs to align with a source sentence
    pub alignment_threshold: f64,

    /// RF+: minimum share of source words removed
    pub rf_min_word_reduction: f64,
    /// RF+: similarity ceiling (above it the text was only trimmed)
    pub rf_max_similarity: f64,
    /// RF+: minimum lexical change (1 - overlap)
    pub rf_min_lexical_change: f64,
    /// RF+: minimum structure change
    pub rf_min_structure_change: f64,

    /// RP+: minimum relative sentence-count growth for the text-level signal
    pub rp_min_sentence_growth: f64,

    /// MOD+: minimum semantic similarity
    pub mod_min_similarity: f64,
    /// MOD+: maximum lexical overlap
    pub mod_max_overlap: f64,
    /// MOD+: minimum voice change or pronoun reduction
    pub mod_min_shift: f64,

    /// EXP+: minimum relative word-count growth
    pub exp_min_expansion: f64,
    /// EXP+: minimum semantic similarity
    pub exp_min_similarity: f64,
    /// EXP+: content words an added target sentence needs to count
    pub exp_min_added_words: usize,

    /// SL+: minimum complexity drop between removed and added words
    pub sl_min_delta: f64,
}

impl Default for AdaptiveThresholds {
    fn default() -> Self {
        Self {
            alignment_threshold: DEFAULT_ALIGNMENT_THRESHOLD,
            rf_min_word_reduction: 0.3,
            rf_max_similarity: 0.75,
            rf_min_lexical_change: 0.5,
            rf_min_structure_change: 0.2,
            rp_min_sentence_growth: 0.2,
            mod_min_similarity: 0.75,
            mod_max_overlap: 0.5,
            mod_min_shift: 0.2,
            exp_min_expansion: 0.1,
            exp_min_similarity: 0.6,
            exp_min_added_words: 3,
            sl_min_delta: 0.05,
        }
    }
}

impl AdaptiveThresholds {
    /// Check that every ratio threshold is a finite number in `[0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        let ratios = [
            ("alignment_threshold", self.alignment_threshold),
            ("rf_min_word_reduction", self.rf_min_word_reduction),
            ("rf_max_similarity", self.rf_max_similarity),
            ("rf_min_lexical_change", self.rf_min_lexical_change),
            ("rf_min_structure_change", self.rf_min_structure_change),
            ("rp_min_sentence_growth", self.rp_min_sentence_growth),
            ("mod_min_similarity", self.mod_min_similarity),
            ("mod_max_overlap", self.mod_max_overlap),
            ("mod_min_shift", self.mod_min_shift),
            ("exp_min_expansion", self.exp_min_expansion),
            ("exp_min_similarity", self.exp_min_similarity),
            ("sl_min_delta", self.sl_min_delta),
        ];
        for (name, value) in ratios {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }

    /// Resolve the thresholds a stage should use.
    pub(crate) fn resolve(
        stage: Stage,
        thresholds: Option<&AdaptiveThresholds>,
    ) -> Result<AdaptiveThresholds, StageError> {
        let resolved = thresholds.cloned().unwrap_or_default();
        resolved
            .validate()
            .map_err(|reason| StageError::InvalidThresholds { stage, reason })?;
        Ok(resolved)
    }
}

/// Whether similarity reaches `min`. Without a similarity capability the
/// check is skipped.
pub(crate) fn similarity_at_least(features: &StrategyFeatures, min: f64) -> bool {
    features.semantic_degraded || features.semantic_similarity >= min
}

/// Whether similarity stays at or below `max`. Without a similarity
/// capability the check is skipped.
pub(crate) fn similarity_at_most(features: &StrategyFeatures, max: f64) -> bool {
    features.semantic_degraded || features.semantic_similarity <= max
}

/// Segmented and aligned sentences of a text pair.
pub(crate) struct SentencePairing<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub source_ranges: Vec<TextRange>,
    pub target_ranges: Vec<TextRange>,
    pub source_words: Vec<Vec<String>>,
    pub target_words: Vec<Vec<String>>,
    pub alignment: SentenceAlignment,
}

impl<'a> SentencePairing<'a> {
    pub fn new(source: &'a str, target: &'a str, alignment_threshold: f64) -> Self {
        let source_ranges = text::split_sentences(source);
        let target_ranges = text::split_sentences(target);
        let source_words: Vec<Vec<String>> = source_ranges
            .iter()
            .map(|r| text::lowercase_words(r.slice(source)))
            .collect();
        let target_words: Vec<Vec<String>> = target_ranges
            .iter()
            .map(|r| text::lowercase_words(r.slice(target)))
            .collect();
        let alignment = text::align_sentences(&source_words, &target_words, alignment_threshold);

        Self {
            source,
            target,
            source_ranges,
            target_ranges,
            source_words,
            target_words,
            alignment,
        }
    }

    pub fn source_sentence(&self, idx: usize) -> &'a str {
        self.source_ranges
            .get(idx)
            .map(|r| r.slice(self.source))
            .unwrap_or("")
    }

    pub fn target_sentence(&self, idx: usize) -> &'a str {
        self.target_ranges
            .get(idx)
            .map(|r| r.slice(self.target))
            .unwrap_or("")
    }

    /// Byte range covering the given target sentences.
    pub fn target_span(&self, indices: &[usize]) -> Option<TextRange> {
        let first = indices.iter().filter_map(|&i| self.target_ranges.get(i)).map(|r| r.start).min()?;
        let last = indices.iter().filter_map(|&i| self.target_ranges.get(i)).map(|r| r.end).max()?;
        Some(TextRange::new(first, last))
    }

    /// Share of content words kept in their original order across aligned
    /// sentence pairs: longest common subsequence over the longer sentence.
    ///
    /// A voice change keeps the words but reorders them, so it scores low
    /// here even when the word sets barely change. `None` without links.
    pub fn ordered_content_overlap(&self) -> Option<f64> {
        let (mut kept, mut total) = (0usize, 0usize);
        for link in &self.alignment.links {
            let source = content_words(&self.source_words[link.source]);
            for &t_idx in &link.targets {
                let target = content_words(&self.target_words[t_idx]);
                kept += common_subsequence_len(&source, &target);
                total += source.len().max(target.len());
            }
        }
        (total > 0).then(|| kept as f64 / total as f64)
    }

    pub fn sentence_count(&self) -> usize {
        self.source_ranges.len().max(self.target_ranges.len())
    }
}

fn content_words(words: &[String]) -> Vec<&str> {
    words
        .iter()
        .map(String::as_str)
        .filter(|w| !text::patterns::is_stopword(w))
        .collect()
}

fn common_subsequence_len(a: &[&str], b: &[&str]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for x in a {
        let mut diagonal = 0;
        for (j, y) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if x == y {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Shorten a sentence for use in an example string.
pub(crate) fn excerpt(sentence: &str, max_chars: usize) -> String {
    let trimmed = sentence.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
