//! Feature extraction for a (source, target) text pair.
//!
//! The extractor decides once, at construction, how it tokenizes text and
//! how it measures semantic similarity:
//!
//! | Capability | Present | Absent |
//! |------------|---------|--------|
//! | parser | parser sentences/tokens, voice and pronoun features | regex words, built-in segmenter, voice/pronoun = 0.0 |
//! | similarity | model score | 0.0, `semantic_degraded = true` |

use std::sync::Arc;
use tracing::{debug, warn};

use crate::capabilities::{LanguageParser, SemanticSimilarity};
use crate::text::{self, patterns};
use crate::types::{StrategyFeatures, TextRange};

/// Default containment a target sentence needs to align with a source sentence.
pub const DEFAULT_ALIGNMENT_THRESHOLD: f64 = 0.35;

/// Coverage below which an aligned source sentence still counts as changed.
const WEAK_ALIGNMENT: f64 = 0.5;

enum Tokenization {
    Parser(Arc<dyn LanguageParser>),
    Heuristic,
}

enum SimilarityMode {
    Model(Arc<dyn SemanticSimilarity>),
    Degraded,
}

/// What the extractor measured on one side of the pair.
struct TextProfile {
    chars: usize,
    words: Vec<String>,
    sentences: Vec<TextRange>,
    sentence_words: Vec<Vec<String>>,
    passive_sentences: usize,
    pronouns: usize,
    connectors: usize,
}

impl TextProfile {
    fn avg_word_length(&self) -> f64 {
        if self.words.is_empty() {
            return 0.0;
        }
        self.words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / self.words.len() as f64
    }

    fn avg_sentence_length(&self) -> f64 {
        self.words.len() as f64 / self.sentences.len().max(1) as f64
    }

    /// Readability proxy: long words in long sentences read harder.
    fn complexity(&self) -> f64 {
        self.avg_word_length() * self.avg_sentence_length()
    }

    fn passive_rate(&self) -> f64 {
        self.passive_sentences as f64 / self.sentences.len().max(1) as f64
    }

    fn pronoun_rate(&self) -> f64 {
        self.pronouns as f64 / self.words.len().max(1) as f64
    }

    fn connector_rate(&self) -> f64 {
        self.connectors as f64 * 100.0 / self.words.len().max(1) as f64
    }

    fn bigrams(&self) -> Vec<String> {
        self.words.windows(2).map(|w| format!("{} {}", w[0], w[1])).collect()
    }
}

/// Computes [`StrategyFeatures`] from a text pair.
pub struct FeatureExtractor {
    tokenization: Tokenization,
    similarity: SimilarityMode,
    alignment_threshold: f64,
}

impl FeatureExtractor {
    /// Create an extractor with optional capabilities.
    pub fn new(
        parser: Option<Arc<dyn LanguageParser>>,
        similarity: Option<Arc<dyn SemanticSimilarity>>,
    ) -> Self {
        let tokenization = match parser {
            Some(parser) => {
                debug!(parser = parser.name(), "Feature extraction using parser capability");
                Tokenization::Parser(parser)
            }
            None => {
                warn!("No parser capability, falling back to heuristic tokenization; voice and pronoun features disabled");
                Tokenization::Heuristic
            }
        };
        let similarity = match similarity {
            Some(model) => {
                debug!(model = model.name(), "Feature extraction using similarity capability");
                SimilarityMode::Model(model)
            }
            None => {
                warn!("No semantic similarity capability, similarity will be reported as 0.0");
                SimilarityMode::Degraded
            }
        };

        Self {
            tokenization,
            similarity,
            alignment_threshold: DEFAULT_ALIGNMENT_THRESHOLD,
        }
    }

    /// Extractor with no capabilities.
    pub fn heuristic() -> Self {
        Self::new(None, None)
    }

    /// Override the sentence alignment threshold.
    pub fn with_alignment_threshold(mut self, threshold: f64) -> Self {
        self.alignment_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn has_parser(&self) -> bool {
        matches!(self.tokenization, Tokenization::Parser(_))
    }

    pub fn has_similarity(&self) -> bool {
        matches!(self.similarity, SimilarityMode::Model(_))
    }

    /// Compute the feature vector for a text pair.
    ///
    /// Blank input on either side yields [`StrategyFeatures::neutral`].
    pub fn extract(&self, source: &str, target: &str) -> StrategyFeatures {
        let src = self.profile(source);
        let tgt = self.profile(target);
        if src.words.is_empty() || tgt.words.is_empty() {
            return StrategyFeatures {
                semantic_degraded: !self.has_similarity(),
                parser_available: self.has_parser(),
                ..StrategyFeatures::neutral()
            };
        }

        let ratio = |t: f64, s: f64| if s > 0.0 { t / s } else { 1.0 };

        let word_count_ratio = ratio(tgt.words.len() as f64, src.words.len() as f64);
        let sentence_count_ratio = ratio(tgt.sentences.len() as f64, src.sentences.len() as f64);

        let semantic_similarity = match &self.similarity {
            SimilarityMode::Model(model) => {
                let score = model.similarity(source, target);
                if score.is_finite() {
                    score.clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }
            SimilarityMode::Degraded => 0.0,
        };

        let source_complexity = src.complexity();
        let complexity_reduction = if source_complexity > 0.0 {
            ((source_complexity - tgt.complexity()) / source_complexity).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let (voice_change_score, pronoun_reduction_score) = match self.tokenization {
            Tokenization::Parser(_) => {
                let voice = (src.passive_rate() - tgt.passive_rate()).abs().clamp(0.0, 1.0);
                let pronoun = if src.pronoun_rate() > 0.0 {
                    ((src.pronoun_rate() - tgt.pronoun_rate()) / src.pronoun_rate()).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (voice, pronoun)
            }
            Tokenization::Heuristic => (0.0, 0.0),
        };

        let expansion = ((word_count_ratio - 1.0) * 2.0).clamp(0.0, 1.0);
        let connector_gain = ((tgt.connector_rate() - src.connector_rate()) / 5.0).clamp(0.0, 1.0);
        let explicitness_score = (0.6 * expansion + 0.4 * connector_gain).clamp(0.0, 1.0);

        let (src_bigrams, tgt_bigrams) = (src.bigrams(), tgt.bigrams());
        let order_change = if src_bigrams.is_empty() && tgt_bigrams.is_empty() {
            0.0
        } else {
            1.0 - text::jaccard(&src_bigrams, &tgt_bigrams)
        };
        let structure_change_score =
            (0.5 * (sentence_count_ratio - 1.0).abs().min(1.0) + 0.5 * order_change).clamp(0.0, 1.0);

        StrategyFeatures {
            length_ratio: ratio(tgt.chars as f64, src.chars as f64),
            word_count_ratio,
            sentence_count_ratio,
            avg_word_length_ratio: ratio(tgt.avg_word_length(), src.avg_word_length()),
            semantic_similarity,
            lexical_overlap: text::jaccard(&src.words, &tgt.words),
            complexity_reduction,
            voice_change_score,
            explicitness_score,
            structure_change_score,
            pronoun_reduction_score,
            strategy_positions: self.changed_positions(&src, &tgt),
            semantic_degraded: !self.has_similarity(),
            parser_available: self.has_parser(),
        }
    }

    fn profile(&self, input: &str) -> TextProfile {
        let connectors = patterns::count_connectors(input);
        let chars = input.trim().chars().count();

        match &self.tokenization {
            Tokenization::Parser(parser) => {
                let doc = parser.parse(input);
                let is_word = |s: &str| s.chars().any(char::is_alphanumeric);
                let words: Vec<String> = doc
                    .words()
                    .filter(|t| is_word(&t.text))
                    .map(|t| t.text.to_lowercase())
                    .collect();
                let sentence_words = doc
                    .sentences
                    .iter()
                    .map(|s| {
                        s.tokens
                            .iter()
                            .filter(|t| is_word(&t.text))
                            .map(|t| t.text.to_lowercase())
                            .collect()
                    })
                    .collect();
                TextProfile {
                    chars,
                    passive_sentences: doc.sentences.iter().filter(|s| s.is_passive()).count(),
                    pronouns: doc.words().filter(|t| t.is_pronoun()).count(),
                    sentences: doc.sentences.iter().map(|s| s.range).collect(),
                    sentence_words,
                    words,
                    connectors,
                }
            }
            Tokenization::Heuristic => {
                let sentences = text::split_sentences(input);
                let sentence_words = sentences
                    .iter()
                    .map(|r| text::lowercase_words(r.slice(input)))
                    .collect();
                TextProfile {
                    chars,
                    words: text::lowercase_words(input),
                    sentences,
                    sentence_words,
                    passive_sentences: 0,
                    pronouns: 0,
                    connectors,
                }
            }
        }
    }

    /// Source offsets of sentences that lost or weakened their counterpart.
    fn changed_positions(&self, src: &TextProfile, tgt: &TextProfile) -> Vec<usize> {
        let alignment =
            text::align_sentences(&src.sentence_words, &tgt.sentence_words, self.alignment_threshold);
        let mut positions: Vec<usize> = alignment
            .source_coverage
            .iter()
            .enumerate()
            .filter(|(idx, coverage)| {
                alignment.unaligned_source.contains(idx) || **coverage < WEAK_ALIGNMENT
            })
            .filter_map(|(idx, _)| src.sentences.get(idx).map(|r| r.start))
            .collect();
        positions.sort_unstable();
        positions
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::heuristic()
    }
}
