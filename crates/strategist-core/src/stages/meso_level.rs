//! Meso stage: sentence-level strategies.
//!
//! | Code | Evidence |
//! |------|----------|
//! | RP+ | a source sentence split into shorter target sentences |
//! | MOD+ | same meaning, different wording plus a voice or pronoun shift |
//! | EXP+ | text expansion, and target sentences with no source |
//! | OM+ | source sentences with no target (only when activated) |

use std::collections::HashSet;
use tracing::{debug, info};

use crate::evidence::{EvidenceBuilder, StrategyEvidence};
use crate::text;
use crate::types::{Stage, StrategyCode, StrategyFeatures};

use super::{
    excerpt, similarity_at_least, AdaptiveThresholds, SentencePairing, StageError, StageEvaluator,
    StageOutcome,
};

/// Sentence count above which complete mode stops before the micro stage.
pub const DEFAULT_COMPLETE_MICRO_SENTENCE_LIMIT: usize = 400;

const EXCERPT_CHARS: usize = 80;

/// Detects sentence-level strategies over aligned sentences.
pub struct MesoEvaluator {
    omission_enabled: bool,
    complete_micro_sentence_limit: usize,
}

impl MesoEvaluator {
    pub fn new(omission_enabled: bool) -> Self {
        Self {
            omission_enabled,
            complete_micro_sentence_limit: DEFAULT_COMPLETE_MICRO_SENTENCE_LIMIT,
        }
    }

    pub fn with_complete_micro_sentence_limit(mut self, limit: usize) -> Self {
        self.complete_micro_sentence_limit = limit;
        self
    }

    fn fragmentation(
        &self,
        pairing: &SentencePairing<'_>,
        features: &StrategyFeatures,
        t: &AdaptiveThresholds,
    ) -> Vec<StrategyEvidence> {
        let mut evidence = Vec::new();
        for link in pairing.alignment.links.iter().filter(|l| l.targets.len() >= 2) {
            let source_len = pairing.source_words[link.source].len() as f64;
            let target_mean = link
                .targets
                .iter()
                .map(|&i| pairing.target_words[i].len())
                .sum::<usize>() as f64
                / link.targets.len() as f64;
            if target_mean >= source_len {
                continue;
            }

            let source_range = pairing.source_ranges[link.source];
            let mut builder = EvidenceBuilder::new(StrategyCode::Fragmentation, Stage::Meso)
                .confidence(0.55 + 0.1 * (link.targets.len() - 1) as f64 + 0.2 * link.score)
                .source_range(source_range.start, source_range.end)
                .source_sentence(link.source)
                .target_sentences(link.targets.iter().copied())
                .example(format!(
                    "{} → {} sentences",
                    excerpt(pairing.source_sentence(link.source), EXCERPT_CHARS),
                    link.targets.len()
                ));
            if let Some(span) = pairing.target_span(&link.targets) {
                builder = builder.target_range(span.start, span.end);
            }
            evidence.push(builder.build());
        }

        if evidence.is_empty() {
            let growth = features.sentence_count_ratio - 1.0;
            // Target average sentence length relative to the source.
            let avg_sentence_ratio =
                features.word_count_ratio / features.sentence_count_ratio.max(f64::EPSILON);
            if growth >= t.rp_min_sentence_growth && avg_sentence_ratio < 1.0 {
                evidence.push(
                    EvidenceBuilder::new(StrategyCode::Fragmentation, Stage::Meso)
                        .confidence(0.5 + 0.2 * growth.min(1.0))
                        .source_range(0, pairing.source.len())
                        .target_range(0, pairing.target.len())
                        .example(format!(
                            "sentence count grew by {:.0}%, average sentence length fell by {:.0}%",
                            growth * 100.0,
                            (1.0 - avg_sentence_ratio) * 100.0
                        ))
                        .build(),
                );
            }
        }
        evidence
    }

    fn modulation(
        &self,
        pairing: &SentencePairing<'_>,
        features: &StrategyFeatures,
        t: &AdaptiveThresholds,
    ) -> Option<StrategyEvidence> {
        let shift = features.voice_change_score.max(features.pronoun_reduction_score);
        let overlap = pairing
            .ordered_content_overlap()
            .map_or(features.lexical_overlap, |ordered| ordered.min(features.lexical_overlap));
        if overlap > t.mod_max_overlap
            || shift < t.mod_min_shift
            || !similarity_at_least(features, t.mod_min_similarity)
        {
            return None;
        }

        let mut pairs: Vec<(f64, usize, usize)> = pairing
            .alignment
            .links
            .iter()
            .flat_map(|link| {
                link.targets.iter().map(move |&t_idx| {
                    let overlap = text::jaccard(&pairing.source_words[link.source], &pairing.target_words[t_idx]);
                    (overlap, link.source, t_idx)
                })
            })
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut builder = EvidenceBuilder::new(StrategyCode::Modulation, Stage::Meso)
            .confidence(0.45 + 0.3 * shift + 0.2 * (1.0 - overlap))
            .source_range(0, pairing.source.len())
            .target_range(0, pairing.target.len());
        for (_, s_idx, t_idx) in pairs.into_iter().take(2) {
            builder = builder.example(format!(
                "{} ⇒ {}",
                excerpt(pairing.source_sentence(s_idx), EXCERPT_CHARS),
                excerpt(pairing.target_sentence(t_idx), EXCERPT_CHARS)
            ));
        }
        Some(builder.build())
    }

    fn explicitation(
        &self,
        pairing: &SentencePairing<'_>,
        features: &StrategyFeatures,
        t: &AdaptiveThresholds,
    ) -> Vec<StrategyEvidence> {
        let mut evidence = Vec::new();

        let expansion = features.word_count_ratio - 1.0;
        if expansion >= t.exp_min_expansion && similarity_at_least(features, t.exp_min_similarity) {
            evidence.push(
                EvidenceBuilder::new(StrategyCode::Explicitation, Stage::Meso)
                    .confidence(0.45 + 0.3 * features.explicitness_score + 0.2 * expansion.min(1.0))
                    .source_range(0, pairing.source.len())
                    .target_range(0, pairing.target.len())
                    .example(format!("word count grew by {:.0}%", expansion * 100.0))
                    .build(),
            );
        }

        let source_vocabulary: HashSet<&str> = pairing
            .source_words
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        for &t_idx in &pairing.alignment.unaligned_target {
            let added: Vec<&str> = pairing.target_words[t_idx]
                .iter()
                .map(String::as_str)
                .filter(|w| !text::patterns::is_stopword(w))
                .collect();
            if added.len() < t.exp_min_added_words {
                continue;
            }
            let novelty =
                added.iter().filter(|w| !source_vocabulary.contains(*w)).count() as f64 / added.len() as f64;
            let range = pairing.target_ranges[t_idx];
            evidence.push(
                EvidenceBuilder::new(StrategyCode::Explicitation, Stage::Meso)
                    .confidence(0.45 + 0.3 * novelty)
                    .target_range(range.start, range.end)
                    .target_sentences([t_idx])
                    .example(format!("added: {}", excerpt(pairing.target_sentence(t_idx), EXCERPT_CHARS)))
                    .build(),
            );
        }
        evidence
    }

    fn omission(&self, pairing: &SentencePairing<'_>, t: &AdaptiveThresholds) -> Vec<StrategyEvidence> {
        pairing
            .alignment
            .unaligned_source
            .iter()
            .map(|&s_idx| {
                let coverage = pairing.alignment.source_coverage.get(s_idx).copied().unwrap_or(0.0);
                let gap = if t.alignment_threshold > 0.0 {
                    1.0 - coverage / t.alignment_threshold
                } else {
                    1.0
                };
                let range = pairing.source_ranges[s_idx];
                EvidenceBuilder::new(StrategyCode::Omission, Stage::Meso)
                    .confidence(0.5 + 0.4 * gap)
                    .source_range(range.start, range.end)
                    .source_sentence(s_idx)
                    .example(format!("omitted: {}", excerpt(pairing.source_sentence(s_idx), EXCERPT_CHARS)))
                    .build()
            })
            .collect()
    }
}

impl StageEvaluator for MesoEvaluator {
    fn stage(&self) -> Stage {
        Stage::Meso
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
        let pairing = SentencePairing::new(source, target, t.alignment_threshold);
        debug!(
            source_sentences = pairing.source_ranges.len(),
            target_sentences = pairing.target_ranges.len(),
            links = pairing.alignment.links.len(),
            "Sentences aligned"
        );

        let mut evidence = self.fragmentation(&pairing, features, &t);
        evidence.extend(self.modulation(&pairing, features, &t));
        evidence.extend(self.explicitation(&pairing, features, &t));
        if self.omission_enabled {
            evidence.extend(self.omission(&pairing, &t));
        }

        let sentences = pairing.sentence_count();
        if complete_analysis_mode && sentences > self.complete_micro_sentence_limit {
            info!(
                sentences,
                limit = self.complete_micro_sentence_limit,
                "Text too long for word-level analysis, stopping after sentence level"
            );
            return Ok(StageOutcome::stop(evidence));
        }
        Ok(StageOutcome::proceed(evidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;

    fn run(evaluator: &MesoEvaluator, source: &str, target: &str) -> StageOutcome {
        let features = FeatureExtractor::heuristic().extract(source, target);
        evaluator.evaluate(&features, source, target, None, false).unwrap()
    }

    fn codes(outcome: &StageOutcome) -> Vec<StrategyCode> {
        outcome.evidence.iter().map(|e| e.strategy_code).collect()
    }

    #[test]
    fn test_detects_local_split() {
        let source = "The committee approved the budget after a long debate about taxes and schools.";
        let target = "The committee approved the budget. The debate about taxes and schools was long.";
        let outcome = run(&MesoEvaluator::new(false), source, target);
        let split = outcome
            .evidence
            .iter()
            .find(|e| e.strategy_code == StrategyCode::Fragmentation)
            .expect("fragmentation evidence");
        assert_eq!(split.source_sentence, Some(0));
        assert_eq!(split.target_sentences, vec![0, 1]);
        assert!(split.target_range.is_some());
    }

    #[test]
    fn test_omission_requires_activation() {
        let source = "The mayor opened the park. Critics questioned the excessive expenditure. Children played.";
        let target = "The mayor opened the park. Children played.";

        let disabled = run(&MesoEvaluator::new(false), source, target);
        assert!(!codes(&disabled).contains(&StrategyCode::Omission));

        let enabled = run(&MesoEvaluator::new(true), source, target);
        let omitted: Vec<_> = enabled
            .evidence
            .iter()
            .filter(|e| e.strategy_code == StrategyCode::Omission)
            .collect();
        assert_eq!(omitted.len(), 1);
        assert_eq!(omitted[0].source_sentence, Some(1));
        assert!(omitted[0].target_sentences.is_empty());
        assert!(omitted[0].target_range.is_none());
        assert_eq!(omitted[0].source_range.unwrap().start, source.find("Critics").unwrap());
    }

    #[test]
    fn test_added_sentence_is_explicitation() {
        let source = "The vote failed.";
        let target = "The vote failed. Fewer than half of the council members attended the session.";
        let outcome = run(&MesoEvaluator::new(false), source, target);
        let added = outcome
            .evidence
            .iter()
            .find(|e| e.strategy_code == StrategyCode::Explicitation && e.source_range.is_none())
            .expect("added-content evidence");
        assert_eq!(added.target_sentences, vec![1]);
    }

    #[test]
    fn test_modulation_with_voice_shift() {
        let features = StrategyFeatures {
            semantic_similarity: 0.85,
            lexical_overlap: 0.3,
            voice_change_score: 0.8,
            ..StrategyFeatures::neutral()
        };
        let source = "The bridge was constructed by the army.";
        let target = "Soldiers built the bridge.";
        let outcome = MesoEvaluator::new(false)
            .evaluate(&features, source, target, None, false)
            .unwrap();
        assert!(codes(&outcome).contains(&StrategyCode::Modulation));
    }

    #[test]
    fn test_modulation_with_english_passive() {
        let features = StrategyFeatures {
            semantic_similarity: 0.9,
            lexical_overlap: 0.8,
            voice_change_score: 1.0,
            ..StrategyFeatures::neutral()
        };
        let evaluator = MesoEvaluator::new(false);

        let passive = evaluator
            .evaluate(&features, "The dog bit the man.", "The man was bitten by the dog.", None, false)
            .unwrap();
        assert!(codes(&passive).contains(&StrategyCode::Modulation));

        let same_order = evaluator
            .evaluate(&features, "The dog bit the man.", "The dog bit the man badly.", None, false)
            .unwrap();
        assert!(!codes(&same_order).contains(&StrategyCode::Modulation));
    }

    #[test]
    fn test_complete_mode_stops_above_sentence_limit() {
        let source = "One fact. Two facts. Three facts. Four facts.";
        let target = "One fact. Two facts. Three facts. Four facts.";
        let features = FeatureExtractor::heuristic().extract(source, target);
        let evaluator = MesoEvaluator::new(false).with_complete_micro_sentence_limit(3);

        let complete = evaluator.evaluate(&features, source, target, None, true).unwrap();
        assert!(!complete.should_continue);

        let performance = evaluator.evaluate(&features, source, target, None, false).unwrap();
        assert!(performance.should_continue);
    }

    #[test]
    fn test_identical_texts_yield_nothing() {
        let text = "The river floods every spring. Farmers move their animals to the hills.";
        let outcome = run(&MesoEvaluator::new(true), text, text);
        assert!(outcome.evidence.is_empty());
    }
}
