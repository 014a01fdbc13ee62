//! The detector facade: cascade plus confidence calibration.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::capabilities::{HeuristicParser, LanguageParser, LexicalSimilarity, SemanticSimilarity};
use crate::cascade::{CascadeOrchestrator, CascadeOutcome};
use crate::confidence::{
    ConfidenceEngine, ConfidenceExplanation, ConfidenceFactor, CrossValidationFeatures,
    EvidenceQuality, StrategyConfidenceProfile,
};
use crate::config::DetectorConfig;
use crate::evidence::StrategyEvidence;
use crate::features::FeatureExtractor;
use crate::lexical::{FrequencyTable, LexicalComplexityScorer};
use crate::salience::SalienceProvider;
use crate::spans::MicroSpanExtractor;
use crate::text;
use crate::types::{AnalysisMode, DetectedStrategy, DetectionReport, StrategyCode};
use crate::DetectionError;

/// Weight of the stage's own confidence among the scoring factors.
const EVIDENCE_STRENGTH_WEIGHT: f64 = 1.5;

/// Builds a [`StrategyDetector`].
#[derive(Default)]
pub struct DetectorBuilder {
    config: DetectorConfig,
    parser: Option<Arc<dyn LanguageParser>>,
    similarity: Option<Arc<dyn SemanticSimilarity>>,
    frequency_table: Option<FrequencyTable>,
}

impl DetectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn LanguageParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn similarity(mut self, similarity: Arc<dyn SemanticSimilarity>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Word frequencies for lexical complexity (defaults to the bundled table).
    pub fn frequency_table(mut self, table: FrequencyTable) -> Self {
        self.frequency_table = Some(table);
        self
    }

    /// Use the built-in heuristic parser and lexical similarity.
    pub fn builtin_capabilities(self) -> Self {
        self.parser(Arc::new(HeuristicParser::new()))
            .similarity(Arc::new(LexicalSimilarity::new()))
    }

    pub fn build(self) -> Result<StrategyDetector, DetectionError> {
        let config = self.config;
        config.validate()?;

        let engine = ConfidenceEngine::with_overrides(&config.profiles)?;
        let salience = SalienceProvider::for_method(&config.salience.method, config.salience.cache_capacity)
            .ok_or_else(|| DetectionError::UnknownSalienceMethod(config.salience.method.clone()))?;
        let salience = Arc::new(salience);

        let scorer = Arc::new(LexicalComplexityScorer::new(
            self.frequency_table.unwrap_or_else(FrequencyTable::builtin),
        ));
        let spans = Arc::new(MicroSpanExtractor::new(config.spans.clone(), Some(scorer.clone())));
        let extractor = FeatureExtractor::new(self.parser, self.similarity)
            .with_alignment_threshold(config.cascade.thresholds.alignment_threshold);

        let orchestrator = CascadeOrchestrator::standard(
            extractor,
            config.policy.clone(),
            config.cascade.clone(),
            salience.clone(),
            scorer,
            spans,
        );

        info!(
            mode = ?config.cascade.mode,
            salience = salience.method(),
            profiles = engine.profiles().len(),
            "Strategy detector ready"
        );

        Ok(StrategyDetector {
            config,
            orchestrator,
            engine,
            salience,
        })
    }
}

/// Detects and scores simplification strategies in a source/target pair.
pub struct StrategyDetector {
    config: DetectorConfig,
    orchestrator: CascadeOrchestrator,
    engine: ConfidenceEngine,
    salience: Arc<SalienceProvider>,
}

impl StrategyDetector {
    pub fn builder() -> DetectorBuilder {
        DetectorBuilder::new()
    }

    /// Detector with the default configuration and built-in capabilities.
    pub fn with_builtin_capabilities() -> Result<Self, DetectionError> {
        Self::builder().builtin_capabilities().build()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn engine(&self) -> &ConfidenceEngine {
        &self.engine
    }

    /// Confidence profiles in use, keyed by code.
    pub fn profiles(&self) -> &BTreeMap<String, StrategyConfidenceProfile> {
        self.engine.profiles()
    }

    pub fn salience(&self) -> &SalienceProvider {
        &self.salience
    }

    /// Accepted strategies for a text pair, in cascade order.
    pub fn detect_strategies(&self, source: &str, target: &str) -> Vec<DetectedStrategy> {
        self.detect(source, target).strategies
    }

    /// Run the cascade and score every piece of evidence.
    pub fn detect(&self, source: &str, target: &str) -> DetectionReport {
        let outcome = self.orchestrator.run(source, target);
        let (source_w, target_w) = self.orchestrator.window(source, target);
        let retention = self.salient_retention(source_w, target_w);

        let mut strategies = Vec::with_capacity(outcome.evidence.len());
        let mut explanations = Vec::with_capacity(outcome.evidence.len());
        for evidence in &outcome.evidence {
            let explanation = self.score(evidence, &outcome, retention);
            if explanation.rejected {
                debug!(
                    code = %evidence.strategy_code,
                    stage = %evidence.stage,
                    raw = evidence.confidence,
                    "Evidence rejected by confidence profile"
                );
                continue;
            }
            explanations.push(explanation.clone());
            strategies.push(DetectedStrategy {
                strategy_code: evidence.strategy_code,
                confidence: explanation.final_confidence,
                confidence_level: explanation.confidence_level,
                examples: evidence.examples.clone(),
                source_range: evidence.source_range,
                target_range: evidence.target_range,
                source_sentence: evidence.source_sentence,
                target_sentences: evidence.target_sentences.clone(),
                stage: evidence.stage,
                explanation,
            });
        }

        let summary = self.engine.get_confidence_summary(&explanations);
        let warnings = self.warnings(&outcome, source_w, target_w);
        info!(
            evidence = outcome.evidence.len(),
            accepted = strategies.len(),
            warnings = warnings.len(),
            "Detection complete"
        );

        DetectionReport {
            strategies,
            summary,
            mode: outcome.window.mode,
            source_sentences_analyzed: outcome.window.source_sentences,
            target_sentences_analyzed: outcome.window.target_sentences,
            features: outcome.features,
            warnings,
            analyzed_at: Utc::now(),
        }
    }

    fn score(
        &self,
        evidence: &StrategyEvidence,
        outcome: &CascadeOutcome,
        retention: Option<f64>,
    ) -> ConfidenceExplanation {
        let code = evidence.strategy_code;
        let strength = ConfidenceFactor::new(
            "evidence_strength",
            evidence.confidence,
            EVIDENCE_STRENGTH_WEIGHT,
            format!("{} stage confidence", evidence.stage),
        )
        .with_evidence(evidence.examples.iter().take(3).cloned());

        let (profile, _) = self.engine.resolve_profile(code.as_str());
        let quality = EvidenceQuality::assess(evidence.examples.len(), &profile.evidence_requirements);

        // Omission and global rewriting are supported by salient terms going
        // missing; every other strategy by them being kept.
        let salience_agreement = retention.map(|kept| match code {
            StrategyCode::Omission | StrategyCode::GlobalRewriting => 1.0 - kept,
            _ => kept,
        });
        let quality_improvement = match code {
            StrategyCode::LexicalSimplification
            | StrategyCode::Fragmentation
            | StrategyCode::GlobalRewriting => {
                Some(outcome.features.complexity_reduction.clamp(0.0, 1.0))
            }
            _ => None,
        };
        let cross_validation = (salience_agreement.is_some() || quality_improvement.is_some())
            .then(|| CrossValidationFeatures {
                salience_agreement,
                quality_improvement,
                ..Default::default()
            });

        self.engine.calculate_confidence(
            code.as_str(),
            &outcome.features,
            &[strength],
            quality,
            cross_validation.as_ref(),
        )
    }

    /// Share of the source's salient terms still present in the target.
    fn salient_retention(&self, source: &str, target: &str) -> Option<f64> {
        if source.trim().is_empty() || target.trim().is_empty() {
            return None;
        }
        let salient = self.salience.extract(source, self.config.salience.max_units);
        if salient.units.is_empty() {
            return None;
        }
        let target_words: std::collections::HashSet<String> =
            text::lowercase_words(target).into_iter().collect();
        let kept = salient
            .units
            .iter()
            .filter(|u| target_words.contains(&u.unit))
            .count();
        Some(kept as f64 / salient.units.len() as f64)
    }

    fn warnings(&self, outcome: &CascadeOutcome, source: &str, target: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        let extractor = self.orchestrator.extractor();
        if !extractor.has_similarity() {
            warnings.push(
                "semantic similarity unavailable: similarity is reported as 0.0 and similarity gates are skipped"
                    .to_string(),
            );
        }
        if !extractor.has_parser() {
            warnings.push("parser unavailable: voice and pronoun features are disabled".to_string());
        }
        for failure in &outcome.failures {
            warnings.push(format!("{} stage skipped: {}", failure.stage, failure.reason));
        }
        if outcome.window.truncated {
            warnings.push(format!(
                "performance mode analyzed only the first {} sentences of the source and the {} target sentences aligned to them",
                self.config.cascade.performance_max_sentences, outcome.window.target_sentences
            ));
        }
        let skipped = outcome.skipped_stages(&self.orchestrator.stages());
        if let (Some(stopped_by), false) = (outcome.stopped_by, skipped.is_empty()) {
            let names = skipped.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            let reason = match outcome.window.mode {
                AnalysisMode::Complete => format!(
                    "text exceeds complete_micro_sentence_limit of {} sentences",
                    self.config.cascade.complete_micro_sentence_limit
                ),
                AnalysisMode::Performance => format!(
                    "{} stage reached early_exit_confidence of {:.2}",
                    stopped_by, self.config.cascade.early_exit_confidence
                ),
            };
            warnings.push(format!("{} stage not run: {}", names, reason));
        }

        let expected = self.config.policy.expected_reduction_ratio;
        let ratio = outcome.features.word_count_ratio;
        if !source.trim().is_empty() && !target.trim().is_empty() && ratio > expected {
            warnings.push(format!(
                "target keeps {:.0}% of the source words, above the expected {:.0}%",
                ratio * 100.0,
                expected * 100.0
            ));
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    fn detector() -> StrategyDetector {
        StrategyDetector::with_builtin_capabilities().unwrap()
    }

    #[test]
    fn test_lexical_substitution_detected() {
        let report = detector().detect(
            "Los vecinos van a utilizar la plaza para la fiesta.",
            "Los vecinos van a usar la plaza para la fiesta.",
        );
        let sl = report
            .strategies
            .iter()
            .find(|s| s.strategy_code == StrategyCode::LexicalSimplification)
            .expect("SL+ detected");
        assert!(sl.confidence > 0.0 && sl.confidence <= 1.0);
        assert!(sl.examples.iter().any(|e| e.contains("utilizar") && e.contains("usar")));
        assert!(!sl.explanation.rejected);
    }

    #[test]
    fn test_readability_gain_cross_validates_reductive_strategies() {
        let report = detector().detect(
            "Los vecinos van a utilizar la plaza para la fiesta.",
            "Los vecinos van a usar la plaza para la fiesta.",
        );
        let sl = report
            .strategies
            .iter()
            .find(|s| s.strategy_code == StrategyCode::LexicalSimplification)
            .expect("SL+ detected");
        let gain = sl
            .explanation
            .factors
            .iter()
            .find(|f| f.name == "quality_improvement")
            .expect("readability gain recorded");
        assert_eq!(gain.value, report.features.complexity_reduction.clamp(0.0, 1.0));

        let added = detector().detect("", "Brand new sentence with added content.");
        assert!(added.strategies[0]
            .explanation
            .factors
            .iter()
            .all(|f| f.name != "quality_improvement"));
    }

    #[test]
    fn test_skipped_micro_stage_warns_in_complete_mode() {
        let mut config = DetectorConfig::default();
        config.cascade.mode = AnalysisMode::Complete;
        config.cascade.complete_micro_sentence_limit = 2;
        let detector = StrategyDetector::builder()
            .config(config)
            .builtin_capabilities()
            .build()
            .unwrap();
        let source = "Los vecinos van a utilizar la plaza. La fiesta empieza tarde. Todos traen comida.";
        let target = "Los vecinos van a usar la plaza. La fiesta empieza tarde. Todos traen comida.";

        let report = detector.detect(source, target);
        assert!(report
            .strategies
            .iter()
            .all(|s| s.strategy_code != StrategyCode::LexicalSimplification));
        assert!(report.warnings.iter().any(|w| w.starts_with("micro stage not run")
            && w.contains("complete_micro_sentence_limit of 2")));

        let full = detector.detect("Los vecinos van a utilizar la plaza.", "Los vecinos van a usar la plaza.");
        assert!(full.warnings.iter().all(|w| !w.contains("not run")));
    }

    #[test]
    fn test_empty_source_reports_explicitation() {
        let report = detector().detect("", "Brand new sentence with added content.");
        assert_eq!(report.strategies.len(), 1);
        let exp = &report.strategies[0];
        assert_eq!(exp.strategy_code, StrategyCode::Explicitation);
        assert!(exp.confidence > 0.0);
        assert!(exp.source_range.is_none());
        assert_eq!(report.summary.total, 1);
    }

    #[test]
    fn test_both_empty_is_empty_report() {
        let report = detector().detect("", "");
        assert!(report.strategies.is_empty());
        assert_eq!(report.summary.total, 0);
    }

    #[test]
    fn test_degraded_capabilities_warn() {
        let detector = StrategyDetector::builder().build().unwrap();
        let report = detector.detect("A plain sentence.", "A plain sentence.");
        assert!(report.features.semantic_degraded);
        assert!(report.warnings.iter().any(|w| w.contains("semantic similarity unavailable")));
        assert!(report.warnings.iter().any(|w| w.contains("parser unavailable")));
    }

    #[test]
    fn test_reduction_ratio_warning() {
        let report = detector().detect("The same text stays.", "The same text stays.");
        assert!(report.warnings.iter().any(|w| w.contains("expected 65%")));
    }

    #[test]
    fn test_unknown_salience_method_rejected() {
        let mut config = DetectorConfig::default();
        config.salience.method = "oracle".to_string();
        let err = StrategyDetector::builder().config(config).build().err().unwrap();
        assert!(matches!(err, DetectionError::UnknownSalienceMethod(m) if m == "oracle"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DetectorConfig::default();
        config.policy.expected_reduction_ratio = 0.0;
        let err = StrategyDetector::builder().config(config).build().err().unwrap();
        assert!(matches!(err, DetectionError::Config(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_report_metadata() {
        let mut config = DetectorConfig::default();
        config.cascade.mode = AnalysisMode::Complete;
        let detector = StrategyDetector::builder()
            .config(config)
            .builtin_capabilities()
            .build()
            .unwrap();
        let report = detector.detect("The cat sat. The dog ran. The bird flew.", "The cat sat. The dog ran.");
        assert_eq!(report.mode, AnalysisMode::Complete);
        assert_eq!(report.source_sentences_analyzed, 3);
        assert_eq!(report.target_sentences_analyzed, 2);
        assert!(report.analyzed_at <= Utc::now());
    }
}
