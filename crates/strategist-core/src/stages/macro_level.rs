//! Macro stage: whole-text global rewriting (RF+).

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::evidence::EvidenceBuilder;
use crate::salience::SalienceProvider;
use crate::text;
use crate::types::{Stage, StrategyCode, StrategyFeatures};

use super::{similarity_at_most, AdaptiveThresholds, StageError, StageEvaluator, StageOutcome};

/// Raw RF+ confidence at which later stages are skipped in performance mode.
pub const DEFAULT_EARLY_EXIT_CONFIDENCE: f64 = 0.9;

/// Salient source terms looked up for RF+ examples.
const SALIENT_TERMS: usize = 8;

/// Detects global rewriting from text-level features.
pub struct MacroEvaluator {
    salience: Arc<SalienceProvider>,
    early_exit_confidence: f64,
}

impl MacroEvaluator {
    pub fn new(salience: Arc<SalienceProvider>) -> Self {
        Self {
            salience,
            early_exit_confidence: DEFAULT_EARLY_EXIT_CONFIDENCE,
        }
    }

    pub fn with_early_exit_confidence(mut self, confidence: f64) -> Self {
        self.early_exit_confidence = confidence;
        self
    }

    fn rewriting_confidence(features: &StrategyFeatures) -> f64 {
        let reduction = features.word_reduction().clamp(0.0, 1.0);
        let lexical_change = features.signal("lexical_overlap").unwrap_or(0.0);
        let similarity_penalty = if features.semantic_degraded {
            0.0
        } else {
            0.2 * (features.semantic_similarity - 0.5).max(0.0)
        };

        (0.4 + 0.3 * reduction
            + 0.2 * lexical_change
            + 0.2 * features.structure_change_score
            - similarity_penalty)
            .clamp(0.0, 1.0)
    }

    /// Salient source terms with no trace in the target.
    fn missing_salient_terms(&self, source: &str, target: &str) -> Vec<String> {
        let target_words: HashSet<String> = text::lowercase_words(target).into_iter().collect();
        self.salience
            .extract(source, SALIENT_TERMS)
            .units
            .into_iter()
            .filter(|u| !target_words.contains(&u.unit))
            .map(|u| u.unit)
            .collect()
    }
}

impl StageEvaluator for MacroEvaluator {
    fn stage(&self) -> Stage {
        Stage::Macro
    }

    fn evaluate(
        &self,
        features: &StrategyFeatures,
        source: &str,
        target: &str,
        thresholds: Option<&AdaptiveThresholds>,
        complete_analysis_mode: bool,
    ) -> Result<StageOutcome, StageError> {
        let t = AdaptiveThresholds::resolve(self.stage(), thresholds)?;

        let reduction = features.word_reduction();
        let lexical_change = 1.0 - features.lexical_overlap;
        let is_rewrite = reduction >= t.rf_min_word_reduction
            && lexical_change >= t.rf_min_lexical_change
            && features.structure_change_score >= t.rf_min_structure_change
            && similarity_at_most(features, t.rf_max_similarity);

        if !is_rewrite {
            return Ok(StageOutcome::proceed(Vec::new()));
        }

        let confidence = Self::rewriting_confidence(features);
        let mut builder = EvidenceBuilder::new(StrategyCode::GlobalRewriting, Stage::Macro)
            .confidence(confidence)
            .source_range(0, source.len())
            .target_range(0, target.len())
            .example(format!("word count reduced by {:.0}%", reduction * 100.0))
            .example(format!("lexical overlap {:.2}", features.lexical_overlap));

        let missing = self.missing_salient_terms(source, target);
        if !missing.is_empty() {
            builder = builder.example(format!("salient source terms not kept: {}", missing.join(", ")));
        }
        let evidence = builder.build();

        if confidence >= self.early_exit_confidence && !complete_analysis_mode {
            debug!(confidence, "Global rewriting is conclusive, skipping finer stages");
            return Ok(StageOutcome::stop(vec![evidence]));
        }
        Ok(StageOutcome::proceed(vec![evidence]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> MacroEvaluator {
        MacroEvaluator::new(Arc::new(SalienceProvider::default()))
    }

    fn rewrite_features(reduction: f64) -> StrategyFeatures {
        StrategyFeatures {
            word_count_ratio: 1.0 - reduction,
            lexical_overlap: 0.1,
            structure_change_score: 0.9,
            semantic_similarity: 0.4,
            ..StrategyFeatures::neutral()
        }
    }

    const SOURCE: &str = "The municipal government enacted comprehensive legislation regulating nocturnal commerce.";
    const TARGET: &str = "Shops must now close at night.";

    #[test]
    fn test_detects_global_rewriting() {
        let outcome = evaluator()
            .evaluate(&rewrite_features(0.5), SOURCE, TARGET, None, false)
            .unwrap();
        assert_eq!(outcome.evidence.len(), 1);
        let evidence = &outcome.evidence[0];
        assert_eq!(evidence.strategy_code, StrategyCode::GlobalRewriting);
        assert_eq!(evidence.stage, Stage::Macro);
        assert!(evidence.examples.iter().any(|e| e.contains("salient source terms")));
    }

    #[test]
    fn test_no_rewrite_on_light_edit() {
        let features = StrategyFeatures {
            word_count_ratio: 0.95,
            lexical_overlap: 0.9,
            semantic_similarity: 0.95,
            ..StrategyFeatures::neutral()
        };
        let outcome = evaluator().evaluate(&features, SOURCE, SOURCE, None, false).unwrap();
        assert!(outcome.evidence.is_empty());
        assert!(outcome.should_continue);
    }

    #[test]
    fn test_early_exit_only_outside_complete_mode() {
        let features = StrategyFeatures {
            semantic_similarity: 0.2,
            lexical_overlap: 0.0,
            structure_change_score: 1.0,
            ..rewrite_features(0.8)
        };
        let eval = evaluator();
        let fast = eval.evaluate(&features, SOURCE, TARGET, None, false).unwrap();
        assert!(fast.evidence[0].confidence >= DEFAULT_EARLY_EXIT_CONFIDENCE);
        assert!(!fast.should_continue);

        let complete = eval.evaluate(&features, SOURCE, TARGET, None, true).unwrap();
        assert!(complete.should_continue);
    }

    #[test]
    fn test_high_similarity_blocks_rewrite() {
        let features = StrategyFeatures {
            semantic_similarity: 0.9,
            ..rewrite_features(0.5)
        };
        let outcome = evaluator().evaluate(&features, SOURCE, TARGET, None, false).unwrap();
        assert!(outcome.evidence.is_empty());
    }

    #[test]
    fn test_invalid_thresholds_fail() {
        let thresholds = AdaptiveThresholds {
            rf_min_word_reduction: -0.1,
            ..Default::default()
        };
        let result = evaluator().evaluate(&rewrite_features(0.5), SOURCE, TARGET, Some(&thresholds), false);
        assert!(result.is_err());
    }
}
