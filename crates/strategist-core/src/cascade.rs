//! The detection cascade: features, then macro → meso → micro stages.
//!
//! The orchestrator owns the stage list and is the only place where a
//! stage failure is handled: the error is logged and the stage contributes
//! no evidence. It also applies the tag policy to whatever the stages emit,
//! so a manual-only or deactivated code never leaves the cascade.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{CascadeSettings, UserConfiguration};
use crate::evidence::{EvidenceBuilder, StrategyEvidence};
use crate::features::FeatureExtractor;
use crate::lexical::LexicalComplexityScorer;
use crate::salience::SalienceProvider;
use crate::spans::MicroSpanExtractor;
use crate::stages::{MacroEvaluator, MesoEvaluator, MicroEvaluator, StageEvaluator};
use crate::text;
use crate::types::{AnalysisMode, Stage, StrategyCode, StrategyFeatures, TextRange};

/// Raw confidence of evidence derived from one blank side of the pair.
const BLANK_SIDE_CONFIDENCE: f64 = 0.9;

/// Source sentences, in multiples of the window, aligned when windowing the target.
const WINDOW_SOURCE_SPAN: usize = 2;

/// Target sentences, in multiples of the window, considered when windowing the target.
const WINDOW_TARGET_SPAN: usize = 4;

/// The part of the text pair the cascade analyzed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeWindow {
    pub mode: AnalysisMode,
    pub source_sentences: usize,
    pub target_sentences: usize,
    /// Sentences were dropped from either text to fit the window
    pub truncated: bool,
}

/// A stage that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: String,
}

/// Everything one cascade run produced.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub features: StrategyFeatures,
    /// Evidence in stage order, after policy gating
    pub evidence: Vec<StrategyEvidence>,
    pub stages_run: Vec<Stage>,
    /// Stage that ended the cascade before the remaining stages ran
    pub stopped_by: Option<Stage>,
    pub failures: Vec<StageFailure>,
    pub window: CascadeWindow,
}

impl CascadeOutcome {
    /// Configured stages that never ran because an earlier stage stopped the cascade.
    pub fn skipped_stages(&self, configured: &[Stage]) -> Vec<Stage> {
        if self.stopped_by.is_none() {
            return Vec::new();
        }
        configured
            .iter()
            .copied()
            .filter(|stage| !self.stages_run.contains(stage))
            .collect()
    }
}

/// Runs the stage evaluators over a text pair.
pub struct CascadeOrchestrator {
    extractor: FeatureExtractor,
    stages: Vec<Box<dyn StageEvaluator>>,
    policy: UserConfiguration,
    settings: CascadeSettings,
}

impl CascadeOrchestrator {
    /// Orchestrator over an explicit, ordered stage list.
    pub fn new(
        extractor: FeatureExtractor,
        stages: Vec<Box<dyn StageEvaluator>>,
        policy: UserConfiguration,
        settings: CascadeSettings,
    ) -> Self {
        Self {
            extractor,
            stages,
            policy,
            settings,
        }
    }

    /// Orchestrator with the macro, meso and micro stages.
    pub fn standard(
        extractor: FeatureExtractor,
        policy: UserConfiguration,
        settings: CascadeSettings,
        salience: Arc<SalienceProvider>,
        scorer: Arc<LexicalComplexityScorer>,
        spans: Arc<MicroSpanExtractor>,
    ) -> Self {
        let stages: Vec<Box<dyn StageEvaluator>> = vec![
            Box::new(
                MacroEvaluator::new(salience).with_early_exit_confidence(settings.early_exit_confidence),
            ),
            Box::new(
                MesoEvaluator::new(policy.is_auto_enabled(StrategyCode::Omission))
                    .with_complete_micro_sentence_limit(settings.complete_micro_sentence_limit),
            ),
            Box::new(MicroEvaluator::new(scorer, spans)),
        ];
        Self::new(extractor, stages, policy, settings)
    }

    pub fn policy(&self) -> &UserConfiguration {
        &self.policy
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Stages in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.iter().map(|s| s.stage()).collect()
    }

    /// The prefix of each text analyzed in the configured mode.
    ///
    /// Performance mode keeps the first `performance_max_sentences` source
    /// sentences and the target sentences aligned to them, so a target that
    /// splits sentences is not cut short of its source.
    pub fn window<'a>(&self, source: &'a str, target: &'a str) -> (&'a str, &'a str) {
        match self.settings.mode {
            AnalysisMode::Complete => (source, target),
            AnalysisMode::Performance => {
                let max = self.settings.performance_max_sentences.max(1);
                let source_w = text::sentence_window(source, max);
                let target_fits = text::sentence_window(target, max).len() == target.len();
                if source_w.len() == source.len() && target_fits {
                    return (source, target);
                }
                (source_w, self.aligned_target_window(source, target, max))
            }
        }
    }

    /// Target prefix ending with the last sentence aligned to one of the
    /// first `max` source sentences.
    fn aligned_target_window<'a>(&self, source: &str, target: &'a str, max: usize) -> &'a str {
        let source_ranges = text::split_sentences(source);
        let target_ranges = text::split_sentences(target);
        let words = |body: &str, ranges: &[TextRange], limit: usize| -> Vec<Vec<String>> {
            ranges
                .iter()
                .take(limit)
                .map(|r| text::lowercase_words(r.slice(body)))
                .collect()
        };
        // Source sentences past the window compete for target sentences.
        let source_words = words(source, &source_ranges, max * WINDOW_SOURCE_SPAN);
        let target_words = words(target, &target_ranges, max * WINDOW_TARGET_SPAN);
        let alignment = text::align_sentences(
            &source_words,
            &target_words,
            self.settings.thresholds.alignment_threshold,
        );

        let last = alignment
            .links
            .iter()
            .filter(|link| link.source < max)
            .flat_map(|link| link.targets.iter().copied())
            .max();
        match last.and_then(|idx| target_ranges.get(idx)) {
            Some(range) => &target[..range.end],
            None => text::sentence_window(target, max),
        }
    }

    /// Raw evidence for a text pair, in stage order.
    pub fn detect(&self, source: &str, target: &str) -> Vec<StrategyEvidence> {
        self.run(source, target).evidence
    }

    /// Run the full cascade.
    pub fn run(&self, source: &str, target: &str) -> CascadeOutcome {
        let (source_w, target_w) = self.window(source, target);
        let window = CascadeWindow {
            mode: self.settings.mode,
            source_sentences: text::split_sentences(source_w).len(),
            target_sentences: text::split_sentences(target_w).len(),
            truncated: source_w.len() < source.len() || target_w.len() < target.len(),
        };
        if window.truncated {
            debug!(
                max_sentences = self.settings.performance_max_sentences,
                "Performance mode: analyzing a sentence window"
            );
        }

        let features = self.extractor.extract(source_w, target_w);
        let mut outcome = CascadeOutcome {
            features,
            evidence: Vec::new(),
            stages_run: Vec::new(),
            stopped_by: None,
            failures: Vec::new(),
            window,
        };

        let (source_blank, target_blank) = (source_w.trim().is_empty(), target_w.trim().is_empty());
        if source_blank || target_blank {
            outcome.evidence = self.gate(self.blank_side_evidence(source_w, target_w));
            return outcome;
        }

        let complete = self.settings.mode.is_complete();
        for stage in &self.stages {
            let kind = stage.stage();
            outcome.stages_run.push(kind);
            match stage.evaluate(
                &outcome.features,
                source_w,
                target_w,
                Some(&self.settings.thresholds),
                complete,
            ) {
                Ok(result) => {
                    debug!(stage = ?kind, evidence = result.evidence.len(), "Stage evaluated");
                    outcome.evidence.extend(self.gate(result.evidence));
                    if !result.should_continue {
                        info!(stage = ?kind, "Cascade stopped early");
                        outcome.stopped_by = Some(kind);
                        break;
                    }
                }
                Err(e) => {
                    warn!(stage = ?kind, error = %e, "Stage failed, continuing without its evidence");
                    outcome.failures.push(StageFailure {
                        stage: kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    /// Evidence for a pair where one side has no text.
    fn blank_side_evidence(&self, source: &str, target: &str) -> Vec<StrategyEvidence> {
        let (source_blank, target_blank) = (source.trim().is_empty(), target.trim().is_empty());
        if source_blank && target_blank {
            return Vec::new();
        }

        if source_blank {
            let sentences = text::split_sentences(target).len();
            let evidence = EvidenceBuilder::new(StrategyCode::Explicitation, Stage::Meso)
                .confidence(BLANK_SIDE_CONFIDENCE)
                .target_range(0, target.len())
                .target_sentences(0..sentences)
                .example("target content has no source counterpart")
                .build();
            return vec![evidence];
        }

        let sentences = text::split_sentences(source).len();
        let mut builder = EvidenceBuilder::new(StrategyCode::Omission, Stage::Meso)
            .confidence(BLANK_SIDE_CONFIDENCE)
            .source_range(0, source.len())
            .example("source content has no target counterpart");
        if sentences == 1 {
            builder = builder.source_sentence(0);
        }
        vec![builder.build()]
    }

    /// Drop evidence for codes the policy does not allow.
    fn gate(&self, evidence: Vec<StrategyEvidence>) -> Vec<StrategyEvidence> {
        evidence
            .into_iter()
            .filter(|e| {
                let allowed = self.policy.is_auto_enabled(e.strategy_code);
                if !allowed {
                    debug!(code = %e.strategy_code, "Evidence dropped by tag policy");
                }
                allowed
            })
            .collect()
    }
}
