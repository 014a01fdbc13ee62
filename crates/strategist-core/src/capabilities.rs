//! Optional linguistic capabilities.
//!
//! The cascade runs without any language model. When a parser or a semantic
//! similarity model is available, the caller injects it through these traits
//! and the feature extractor uses it instead of its fallbacks.
//!
//! Two lightweight implementations ship with the crate: [`HeuristicParser`]
//! (closed-class word lists and participle patterns) and
//! [`LexicalSimilarity`] (bag-of-words cosine).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::text::{self, patterns};
use crate::types::TextRange;

/// Coarse part-of-speech tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartOfSpeech {
    Noun,
    ProperNoun,
    Verb,
    Auxiliary,
    Adjective,
    Adverb,
    Pronoun,
    Determiner,
    Adposition,
    Conjunction,
    Numeral,
    Punctuation,
    Other,
}

/// One token of a parsed sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub lemma: Option<String>,
    pub pos: Option<PartOfSpeech>,
    /// Dependency label (Universal Dependencies style, e.g. `aux:pass`)
    pub dep: Option<String>,
}

impl Token {
    pub fn is_pronoun(&self) -> bool {
        self.pos == Some(PartOfSpeech::Pronoun)
    }

    pub fn is_passive_marker(&self) -> bool {
        matches!(
            self.dep.as_deref(),
            Some("aux:pass") | Some("auxpass") | Some("nsubj:pass") | Some("nsubjpass")
        )
    }
}

/// A parsed sentence with its location in the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSentence {
    pub text: String,
    pub range: TextRange,
    pub tokens: Vec<Token>,
}

impl ParsedSentence {
    pub fn is_passive(&self) -> bool {
        self.tokens.iter().any(Token::is_passive_marker)
    }
}

/// A parsed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub sentences: Vec<ParsedSentence>,
}

impl ParsedDocument {
    /// All non-punctuation tokens.
    pub fn words(&self) -> impl Iterator<Item = &Token> {
        self.sentences
            .iter()
            .flat_map(|s| s.tokens.iter())
            .filter(|t| t.pos != Some(PartOfSpeech::Punctuation))
    }
}

/// Sentence/token parser capability.
pub trait LanguageParser: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Split and tag a text.
    fn parse(&self, text: &str) -> ParsedDocument;
}

/// Semantic similarity capability.
pub trait SemanticSimilarity: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Similarity of two texts in `[0, 1]`.
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Rule-based parser covering the closed word classes the features need.
///
/// Tags pronouns and determiners from word lists and marks a passive
/// auxiliary (`aux:pass`) when an auxiliary is followed, within two words,
/// by something that looks like a past participle.
#[derive(Debug, Clone, Default)]
pub struct HeuristicParser;

impl HeuristicParser {
    pub fn new() -> Self {
        Self
    }

    fn tag(word: &str) -> PartOfSpeech {
        let lower = word.to_lowercase();
        if patterns::is_pronoun(&lower) {
            PartOfSpeech::Pronoun
        } else if patterns::is_passive_auxiliary(&lower) {
            PartOfSpeech::Auxiliary
        } else if word.chars().all(|c| c.is_numeric()) {
            PartOfSpeech::Numeral
        } else if patterns::is_stopword(&lower) {
            PartOfSpeech::Determiner
        } else if word.chars().next().is_some_and(char::is_uppercase) {
            PartOfSpeech::ProperNoun
        } else {
            PartOfSpeech::Other
        }
    }
}

impl LanguageParser for HeuristicParser {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn parse(&self, input: &str) -> ParsedDocument {
        let sentences = text::split_sentences(input)
            .into_iter()
            .map(|range| {
                let sentence = range.slice(input);
                let mut tokens: Vec<Token> = text::words(sentence)
                    .into_iter()
                    .map(|w| Token {
                        text: w.text.to_string(),
                        lemma: None,
                        pos: Some(Self::tag(w.text)),
                        dep: None,
                    })
                    .collect();

                for i in 0..tokens.len() {
                    if tokens[i].pos != Some(PartOfSpeech::Auxiliary) {
                        continue;
                    }
                    let participle = tokens
                        .iter()
                        .skip(i + 1)
                        .take(2)
                        .any(|t| patterns::looks_like_participle(&t.text));
                    if participle {
                        tokens[i].dep = Some("aux:pass".to_string());
                    }
                }

                ParsedSentence {
                    text: sentence.to_string(),
                    range,
                    tokens,
                }
            })
            .collect();

        ParsedDocument { sentences }
    }
}

/// Cosine similarity over lowercase word counts.
///
/// A lexical stand-in for an embedding model: it rewards shared vocabulary
/// and ignores paraphrase.
#[derive(Debug, Clone, Default)]
pub struct LexicalSimilarity;

impl LexicalSimilarity {
    pub fn new() -> Self {
        Self
    }
}

impl SemanticSimilarity for LexicalSimilarity {
    fn name(&self) -> &str {
        "lexical-cosine"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        let counts = |s: &str| {
            let mut map: HashMap<String, f64> = HashMap::new();
            for word in text::lowercase_words(s) {
                *map.entry(word).or_insert(0.0) += 1.0;
            }
            map
        };
        let a = counts(a);
        let b = counts(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(w, ca)| b.get(w).map(|cb| ca * cb))
            .sum();
        let norm_a = a.values().map(|c| c * c).sum::<f64>().sqrt();
        let norm_b = b.values().map(|c| c * c).sum::<f64>().sqrt();
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}
