//! Raw strategy evidence emitted by the cascade stages.
//!
//! Evidence is unweighted: it records what a stage saw and where. The
//! confidence engine turns it into a calibrated score. A record is never
//! changed after it is built; recomputation produces a new record.

use serde::{Deserialize, Serialize};

use crate::types::{Stage, StrategyCode, TextRange};

/// A detection record produced by one stage evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyEvidence {
    /// Which strategy this evidence supports
    pub strategy_code: StrategyCode,

    /// Raw stage confidence in `[0, 1]`
    pub confidence: f64,

    /// Human-readable snippets supporting the detection
    pub examples: Vec<String>,

    /// Where in the source the evidence lives
    pub source_range: Option<TextRange>,

    /// Where in the target the evidence lives
    pub target_range: Option<TextRange>,

    /// Index of the source sentence, for sentence-level evidence
    pub source_sentence: Option<usize>,

    /// Indices of the target sentences, for sentence-level evidence
    pub target_sentences: Vec<usize>,

    /// Stage that produced the record
    pub stage: Stage,
}

impl StrategyEvidence {
    /// Evidence spanning a whole text pair.
    pub fn text_level(
        strategy_code: StrategyCode,
        stage: Stage,
        confidence: f64,
        source: &str,
        target: &str,
    ) -> Self {
        EvidenceBuilder::new(strategy_code, stage)
            .confidence(confidence)
            .source_range(0, source.len())
            .target_range(0, target.len())
            .build()
    }
}

/// Builder for creating evidence with fluent API.
pub struct EvidenceBuilder {
    strategy_code: StrategyCode,
    stage: Stage,
    confidence: f64,
    examples: Vec<String>,
    source_range: Option<TextRange>,
    target_range: Option<TextRange>,
    source_sentence: Option<usize>,
    target_sentences: Vec<usize>,
}

impl EvidenceBuilder {
    /// Start building evidence for a strategy.
    pub fn new(strategy_code: StrategyCode, stage: Stage) -> Self {
        Self {
            strategy_code,
            stage,
            confidence: 0.0,
            examples: Vec::new(),
            source_range: None,
            target_range: None,
            source_sentence: None,
            target_sentences: Vec::new(),
        }
    }

    /// Set the raw confidence (clamped to `[0, 1]`).
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Add a supporting example.
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Add several supporting examples.
    pub fn examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples.extend(examples.into_iter().map(Into::into));
        self
    }

    /// Point at a byte range of the source.
    pub fn source_range(mut self, start: usize, end: usize) -> Self {
        self.source_range = Some(TextRange::new(start, end));
        self
    }

    /// Point at a byte range of the target.
    pub fn target_range(mut self, start: usize, end: usize) -> Self {
        self.target_range = Some(TextRange::new(start, end));
        self
    }

    /// Attach the source sentence index.
    pub fn source_sentence(mut self, index: usize) -> Self {
        self.source_sentence = Some(index);
        self
    }

    /// Attach the target sentence indices.
    pub fn target_sentences(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.target_sentences = indices.into_iter().collect();
        self
    }

    /// Build the evidence.
    pub fn build(self) -> StrategyEvidence {
        StrategyEvidence {
            strategy_code: self.strategy_code,
            confidence: self.confidence,
            examples: self.examples,
            source_range: self.source_range,
            target_range: self.target_range,
            source_sentence: self.source_sentence,
            target_sentences: self.target_sentences,
            stage: self.stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_builder() {
        let evidence = EvidenceBuilder::new(StrategyCode::LexicalSimplification, Stage::Micro)
            .confidence(0.7)
            .example("utilizar → usar")
            .source_range(10, 18)
            .target_range(10, 14)
            .source_sentence(2)
            .target_sentences([2])
            .build();

        assert_eq!(evidence.strategy_code, StrategyCode::LexicalSimplification);
        assert_eq!(evidence.examples, vec!["utilizar → usar".to_string()]);
        assert_eq!(evidence.source_range, Some(TextRange::new(10, 18)));
        assert_eq!(evidence.target_range, Some(TextRange::new(10, 14)));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let evidence = EvidenceBuilder::new(StrategyCode::GlobalRewriting, Stage::Macro)
            .confidence(1.7)
            .build();
        assert_eq!(evidence.confidence, 1.0);

        let evidence = EvidenceBuilder::new(StrategyCode::GlobalRewriting, Stage::Macro)
            .confidence(f64::NAN)
            .build();
        assert_eq!(evidence.confidence, 0.0);
    }

    #[test]
    fn test_text_level_evidence_covers_both_texts() {
        let evidence = StrategyEvidence::text_level(
            StrategyCode::Explicitation,
            Stage::Meso,
            0.8,
            "",
            "Added text.",
        );
        assert_eq!(evidence.source_range, Some(TextRange::new(0, 0)));
        assert_eq!(evidence.target_range, Some(TextRange::new(0, 11)));
    }
}
