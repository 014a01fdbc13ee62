//! Micro stage: lexical substitution (SL+) inside aligned sentences.

use std::collections::HashSet;
use std::sync::Arc;

use crate::evidence::EvidenceBuilder;
use crate::lexical::LexicalComplexityScorer;
use crate::spans::MicroSpanExtractor;
use crate::text;
use crate::types::{Stage, StrategyCode, StrategyFeatures};

use super::{AdaptiveThresholds, SentencePairing, StageError, StageEvaluator, StageOutcome};

/// Substitution pairs listed per evidence record.
const MAX_SUBSTITUTIONS: usize = 3;

/// Detects word substitutions toward more frequent vocabulary.
pub struct MicroEvaluator {
    scorer: Arc<LexicalComplexityScorer>,
    spans: Arc<MicroSpanExtractor>,
}

impl MicroEvaluator {
    pub fn new(scorer: Arc<LexicalComplexityScorer>, spans: Arc<MicroSpanExtractor>) -> Self {
        Self { scorer, spans }
    }

    /// Content words of `words` missing from `other`, in first-seen order.
    fn difference(words: &[String], other: &[String]) -> Vec<String> {
        let other: HashSet<&str> = other.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        words
            .iter()
            .filter(|w| {
                w.chars().any(char::is_alphabetic)
                    && !text::patterns::is_stopword(w)
                    && !other.contains(w.as_str())
            })
            .filter(|w| seen.insert(w.as_str()))
            .cloned()
            .collect()
    }

    /// Pair the hardest removed words with the easiest added ones.
    fn substitutions(&self, removed: &[String], added: &[String]) -> Vec<String> {
        let by_complexity = |words: &[String], descending: bool| {
            let mut scored: Vec<(f64, &String)> =
                words.iter().map(|w| (self.scorer.word_complexity(w), w)).collect();
            scored.sort_by(|a, b| {
                let order = a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1));
                if descending {
                    order.reverse()
                } else {
                    order
                }
            });
            scored.into_iter().map(|(_, w)| w.clone()).collect::<Vec<_>>()
        };

        by_complexity(removed, true)
            .into_iter()
            .zip(by_complexity(added, false))
            .take(MAX_SUBSTITUTIONS)
            .map(|(from, to)| format!("{} → {}", from, to))
            .collect()
    }
}

impl StageEvaluator for MicroEvaluator {
    fn stage(&self) -> Stage {
        Stage::Micro
    }

    fn evaluate(
        &self,
        _features: &StrategyFeatures,
        source: &str,
        target: &str,
        thresholds: Option<&AdaptiveThresholds>,
        _complete_analysis_mode: bool,
    ) -> Result<StageOutcome, StageError> {
        let t = AdaptiveThresholds::resolve(self.stage(), thresholds)?;
        let pairing = SentencePairing::new(source, target, t.alignment_threshold);

        let mut evidence = Vec::new();
        for link in &pairing.alignment.links {
            let target_words: Vec<String> = link
                .targets
                .iter()
                .flat_map(|&i| pairing.target_words[i].iter().cloned())
                .collect();
            let source_words = &pairing.source_words[link.source];

            let removed = Self::difference(source_words, &target_words);
            let added = Self::difference(&target_words, source_words);
            if removed.is_empty() || added.is_empty() {
                continue;
            }

            let (delta, simplified) = self.scorer.compare(&removed, &added, t.sl_min_delta);
            if !simplified {
                continue;
            }

            let source_range = pairing.source_ranges[link.source];
            let mut builder = EvidenceBuilder::new(StrategyCode::LexicalSimplification, Stage::Micro)
                .confidence((0.45 + delta).min(0.95))
                .source_range(source_range.start, source_range.end)
                .source_sentence(link.source)
                .target_sentences(link.targets.iter().copied())
                .examples(self.substitutions(&removed, &added));
            if let Some(span) = pairing.target_span(&link.targets) {
                builder = builder.target_range(span.start, span.end);
            }
            for span in self.spans.extract(pairing.source_sentence(link.source)) {
                builder = builder.example(format!("span: {}", span.text));
            }
            evidence.push(builder.build());
        }

        Ok(StageOutcome::proceed(evidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::FrequencyTable;
    use crate::types::TextRange;

    fn evaluator() -> MicroEvaluator {
        MicroEvaluator::new(
            Arc::new(LexicalComplexityScorer::default()),
            Arc::new(MicroSpanExtractor::default()),
        )
    }

    fn run(source: &str, target: &str) -> StageOutcome {
        evaluator()
            .evaluate(&StrategyFeatures::neutral(), source, target, None, false)
            .unwrap()
    }

    #[test]
    fn test_detects_spanish_substitution() {
        let source = "Los vecinos van a utilizar la plaza para la fiesta.";
        let target = "Los vecinos van a usar la plaza para la fiesta.";
        let outcome = run(source, target);
        assert_eq!(outcome.evidence.len(), 1);
        let evidence = &outcome.evidence[0];
        assert_eq!(evidence.strategy_code, StrategyCode::LexicalSimplification);
        assert_eq!(evidence.examples[0], "utilizar → usar");
        assert_eq!(evidence.source_sentence, Some(0));
        assert_eq!(evidence.target_sentences, vec![0]);
        assert_eq!(evidence.target_range, Some(TextRange::new(0, target.len())));
    }

    #[test]
    fn test_harder_target_word_is_not_simplification() {
        let source = "Los vecinos van a usar la plaza para la fiesta.";
        let target = "Los vecinos van a utilizar la plaza para la fiesta.";
        assert!(run(source, target).evidence.is_empty());
    }

    #[test]
    fn test_unchanged_sentence_yields_nothing() {
        let text = "The workers use the tools every day.";
        assert!(run(text, text).evidence.is_empty());
    }

    #[test]
    fn test_substitution_pairs_order_by_complexity() {
        let table = FrequencyTable::from_pairs([
            ("use", 50_000u64),
            ("help", 40_000),
            ("utilize", 100),
            ("facilitate", 50),
        ]);
        let micro = MicroEvaluator::new(
            Arc::new(LexicalComplexityScorer::new(table)),
            Arc::new(MicroSpanExtractor::default()),
        );
        let pairs = micro.substitutions(
            &["utilize".to_string(), "facilitate".to_string()],
            &["use".to_string(), "help".to_string()],
        );
        assert_eq!(pairs, vec!["facilitate → use", "utilize → help"]);
    }
}
