//! End-to-end properties of the detection cascade.

use proptest::prelude::*;
use std::sync::Arc;

use strategist_core::stages::{MesoEvaluator, MicroEvaluator};
use strategist_core::{
    detect_strategies, AdaptiveThresholds, AnalysisMode, CascadeOrchestrator, CascadeSettings,
    DetectorConfig, FeatureExtractor, LexicalComplexityScorer, MicroSpanExtractor, Stage,
    StageError, StageEvaluator, StageOutcome, StrategyCode, StrategyDetector, StrategyFeatures,
    TagConfig, UserConfiguration,
};

/// Sentences that share no content words.
const SENTENCES: [&str; 30] = [
    "Apples grow quickly.",
    "Bridges span canyons.",
    "Cats chase mice.",
    "Doctors heal patients.",
    "Eagles soar high.",
    "Farmers plant wheat.",
    "Glaciers carve valleys.",
    "Hackers breach servers.",
    "Islands attract tourists.",
    "Judges weigh arguments.",
    "Kites dance overhead.",
    "Lawyers draft contracts.",
    "Miners dig coal.",
    "Nurses monitor vitals.",
    "Oceans absorb heat.",
    "Painters mix pigments.",
    "Queens rule kingdoms.",
    "Rivers feed deltas.",
    "Sailors navigate storms.",
    "Tailors hem trousers.",
    "Umbrellas block rain.",
    "Volcanoes spew lava.",
    "Wolves hunt deer.",
    "Xylophones ring brightly.",
    "Yachts cruise harbors.",
    "Zebras graze grasslands.",
    "Bakers knead dough.",
    "Chemists titrate acids.",
    "Drivers obey signals.",
    "Engineers design turbines.",
];

fn text_without(count: usize, dropped: Option<usize>) -> String {
    SENTENCES[..count]
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != dropped)
        .map(|(_, s)| *s)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Each sentence "A b c." rewritten as the two sentences "A b. B c.".
fn fragmented(count: usize) -> String {
    SENTENCES[..count]
        .iter()
        .map(|s| {
            let words: Vec<&str> = s.trim_end_matches('.').split(' ').collect();
            let mut middle = words[1].chars();
            let capitalized: String = middle
                .next()
                .map(|c| c.to_uppercase().chain(middle).collect())
                .unwrap_or_default();
            format!("{} {}. {} {}.", words[0], words[1], capitalized, words[2])
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn detector(mode: AnalysisMode, omission: bool) -> StrategyDetector {
    let mut config = DetectorConfig::default();
    config.cascade.mode = mode;
    config.policy.set_active(StrategyCode::Omission, omission);
    StrategyDetector::builder()
        .config(config)
        .builtin_capabilities()
        .build()
        .unwrap()
}

#[test]
fn test_both_blank_yield_nothing() {
    assert!(detect_strategies("", "").unwrap().is_empty());
    assert!(detect_strategies(" \n\t", "   ").unwrap().is_empty());
}

#[test]
fn test_blank_source_is_explicitation() {
    let strategies = detect_strategies("", "A completely new paragraph appears here.").unwrap();
    assert_eq!(strategies.len(), 1);
    assert_eq!(strategies[0].strategy_code, StrategyCode::Explicitation);
    assert!(strategies[0].confidence > 0.0);
    assert!(strategies[0].target_range.is_some());
}

#[test]
fn test_omission_beyond_fifth_sentence_in_complete_mode() {
    let source = text_without(15, None);
    let target = text_without(15, Some(11));

    let report = detector(AnalysisMode::Complete, true).detect(&source, &target);
    assert_eq!(report.source_sentences_analyzed, 15);

    let omission = report
        .strategies
        .iter()
        .find(|s| s.strategy_code == StrategyCode::Omission)
        .expect("omission of sentence 12 detected");
    assert_eq!(omission.source_sentence, Some(11));
    assert_eq!(
        omission.source_range.map(|r| r.start),
        source.find("Lawyers")
    );
    assert!(omission.target_sentences.is_empty());
    assert!(omission.confidence > 0.0);
}

#[test]
fn test_performance_window_hides_late_omission() {
    let source = text_without(30, None);
    let target = text_without(30, Some(22));

    let fast = detector(AnalysisMode::Performance, true).detect(&source, &target);
    assert_eq!(fast.source_sentences_analyzed, 20);
    assert!(fast
        .strategies
        .iter()
        .all(|s| s.strategy_code != StrategyCode::Omission));
    assert!(fast.warnings.iter().any(|w| w.contains("first 20 sentences")));

    let full = detector(AnalysisMode::Complete, true).detect(&source, &target);
    let omission = full
        .strategies
        .iter()
        .find(|s| s.strategy_code == StrategyCode::Omission)
        .expect("omission of sentence 23 detected");
    assert_eq!(omission.source_sentence, Some(22));
}

#[test]
fn test_performance_window_follows_fragmented_target() {
    let source = text_without(20, None);
    let target = fragmented(20);

    let report = detector(AnalysisMode::Performance, true).detect(&source, &target);
    assert_eq!(report.source_sentences_analyzed, 20);
    assert_eq!(report.target_sentences_analyzed, 40);
    assert!(report
        .strategies
        .iter()
        .all(|s| s.strategy_code != StrategyCode::Omission));
    assert!(report.warnings.iter().all(|w| !w.contains("performance mode")));
}

#[test]
fn test_truncated_window_keeps_aligned_target_fragments() {
    let source = text_without(30, None);
    let target = fragmented(30);

    let report = detector(AnalysisMode::Performance, true).detect(&source, &target);
    assert_eq!(report.source_sentences_analyzed, 20);
    assert_eq!(report.target_sentences_analyzed, 40);
    assert!(report
        .strategies
        .iter()
        .all(|s| s.strategy_code != StrategyCode::Omission));
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("first 20 sentences") && w.contains("40 target sentences")));
}

#[test]
fn test_omission_requires_activation() {
    let source = text_without(10, None);
    let target = text_without(10, Some(4));
    let report = detector(AnalysisMode::Complete, false).detect(&source, &target);
    assert!(report
        .strategies
        .iter()
        .all(|s| s.strategy_code != StrategyCode::Omission));
}

struct BrokenStage;

impl StageEvaluator for BrokenStage {
    fn stage(&self) -> Stage {
        Stage::Macro
    }

    fn evaluate(
        &self,
        _features: &StrategyFeatures,
        _source: &str,
        _target: &str,
        _thresholds: Option<&AdaptiveThresholds>,
        _complete: bool,
    ) -> Result<StageOutcome, StageError> {
        Err(StageError::EvaluationFailed {
            stage: Stage::Macro,
            reason: "salience backend offline".to_string(),
        })
    }
}

#[test]
fn test_stage_failure_fails_open() {
    let scorer = Arc::new(LexicalComplexityScorer::default());
    let stages: Vec<Box<dyn StageEvaluator>> = vec![
        Box::new(BrokenStage),
        Box::new(MesoEvaluator::new(false)),
        Box::new(MicroEvaluator::new(scorer, Arc::new(MicroSpanExtractor::default()))),
    ];
    let cascade = CascadeOrchestrator::new(
        FeatureExtractor::heuristic(),
        stages,
        UserConfiguration::default(),
        CascadeSettings::default(),
    );

    let outcome = cascade.run(
        "The vote failed.",
        "The vote failed. Fewer than half of the council members attended the session.",
    );
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.stages_run, vec![Stage::Macro, Stage::Meso, Stage::Micro]);
    assert!(outcome
        .evidence
        .iter()
        .any(|e| e.strategy_code == StrategyCode::Explicitation));
}

#[test]
fn test_semantic_deviation_stays_manual_only() {
    let config = DetectorConfig::from_yaml(
        r#"
policy:
  tags:
    PRO+:
      active: true
      manual_only: false
"#,
    )
    .unwrap();
    assert!(config.policy.tag(StrategyCode::SemanticDeviation).manual_only);
    assert!(!config.policy.is_auto_enabled(StrategyCode::SemanticDeviation));

    let mut policy = UserConfiguration::default();
    policy.set_tag(
        StrategyCode::SemanticDeviation,
        TagConfig {
            active: true,
            manual_only: false,
        },
    );
    assert!(policy.tag(StrategyCode::SemanticDeviation).manual_only);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_no_manual_only_or_inactive_codes(
        source in "[A-Za-z ,]{0,60}(\\. [A-Z][a-z ]{0,40}){0,4}\\.?",
        target in "[A-Za-z ,]{0,60}(\\. [A-Z][a-z ]{0,40}){0,4}\\.?",
    ) {
        let strategies = detect_strategies(&source, &target).unwrap();
        for s in &strategies {
            prop_assert_ne!(s.strategy_code, StrategyCode::SemanticDeviation);
            prop_assert_ne!(s.strategy_code, StrategyCode::Omission);
            prop_assert!(s.confidence > 0.0 && s.confidence <= 1.0);
            prop_assert!(!s.explanation.rejected);
        }
    }

    #[test]
    fn prop_detection_is_deterministic(
        source in "[A-Za-z ]{1,50}\\. [A-Z][a-z ]{1,40}\\.",
        target in "[A-Za-z ]{1,50}\\.",
    ) {
        let detector = StrategyDetector::with_builtin_capabilities().unwrap();
        let first = detector.detect(&source, &target);
        let second = detector.detect(&source, &target);
        let codes = |r: &strategist_core::DetectionReport| {
            r.strategies.iter().map(|s| (s.strategy_code, s.confidence)).collect::<Vec<_>>()
        };
        prop_assert_eq!(codes(&first), codes(&second));
    }
}
