//! Salient span extraction inside a single sentence.
//!
//! Candidate spans are content words (`keyword`) or runs of up to
//! `max_phrase_words` adjacent content words (`phrase`). Each word weighs
//! `0.1 + complexity` when a [`LexicalComplexityScorer`] is attached, or a
//! length-based weight otherwise. The highest-scoring candidates are picked
//! greedily without overlap and normalized so the best span has salience 1.0.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::cache::BoundedCache;
use crate::lexical::LexicalComplexityScorer;
use crate::text::{self, patterns, Word};

/// How candidate spans are formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpanMethod {
    Keyword,
    Phrase,
    /// A method name this build does not know; extraction yields nothing
    Unsupported(String),
}

impl SpanMethod {
    pub fn as_str(&self) -> &str {
        match self {
            SpanMethod::Keyword => "keyword",
            SpanMethod::Phrase => "phrase",
            SpanMethod::Unsupported(name) => name,
        }
    }
}

impl From<String> for SpanMethod {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyword" => SpanMethod::Keyword,
            "phrase" => SpanMethod::Phrase,
            _ => SpanMethod::Unsupported(value),
        }
    }
}

impl From<&str> for SpanMethod {
    fn from(value: &str) -> Self {
        SpanMethod::from(value.to_string())
    }
}

impl From<SpanMethod> for String {
    fn from(value: SpanMethod) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SpanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A salient span of a sentence (byte offsets into the sentence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub salience: f64,
    pub method: String,
}

impl Span {
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Configuration for [`MicroSpanExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanExtractorConfig {
    pub method: SpanMethod,
    pub max_spans: usize,
    pub min_sentence_chars: usize,
    pub max_phrase_words: usize,
    pub cache_capacity: usize,
}

impl Default for SpanExtractorConfig {
    fn default() -> Self {
        Self {
            method: SpanMethod::Phrase,
            max_spans: 3,
            min_sentence_chars: 12,
            max_phrase_words: 3,
            cache_capacity: 512,
        }
    }
}

/// Ranks and selects non-overlapping salient spans, with an LRU cache keyed
/// by (sentence, span count).
pub struct MicroSpanExtractor {
    config: SpanExtractorConfig,
    scorer: Option<Arc<LexicalComplexityScorer>>,
    cache: BoundedCache<(String, usize), Vec<Span>>,
}

impl MicroSpanExtractor {
    pub fn new(config: SpanExtractorConfig, scorer: Option<Arc<LexicalComplexityScorer>>) -> Self {
        let cache = BoundedCache::new(config.cache_capacity);
        Self {
            config,
            scorer,
            cache,
        }
    }

    pub fn config(&self) -> &SpanExtractorConfig {
        &self.config
    }

    /// Extract up to the configured `max_spans` spans.
    pub fn extract(&self, sentence: &str) -> Vec<Span> {
        self.extract_with_limit(sentence, self.config.max_spans)
    }

    /// Extract up to `max_spans` spans.
    pub fn extract_with_limit(&self, sentence: &str, max_spans: usize) -> Vec<Span> {
        if max_spans == 0 {
            return Vec::new();
        }
        self.cache
            .get_or_insert_with((sentence.to_string(), max_spans), || {
                self.compute(sentence, max_spans)
            })
    }

    /// Number of cached sentences.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cache keys from least to most recently used.
    pub fn cache_keys(&self) -> Vec<(String, usize)> {
        self.cache.keys()
    }

    fn word_weight(&self, word: &str) -> f64 {
        match &self.scorer {
            Some(scorer) => 0.1 + scorer.word_complexity(word),
            None => 0.1 + (word.chars().count().min(15) as f64) / 15.0,
        }
    }

    fn compute(&self, sentence: &str, max_spans: usize) -> Vec<Span> {
        if sentence.trim().chars().count() < self.config.min_sentence_chars {
            return Vec::new();
        }

        let max_words = match &self.config.method {
            SpanMethod::Keyword => 1,
            SpanMethod::Phrase => self.config.max_phrase_words.max(1),
            SpanMethod::Unsupported(name) => {
                debug!(method = %name, "Unsupported span method, no spans extracted");
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        for run in content_runs(sentence) {
            for len in 1..=max_words.min(run.len()) {
                for window in run.windows(len) {
                    let (first, last) = (&window[0], &window[len - 1]);
                    candidates.push(Span {
                        start: first.start,
                        end: last.end,
                        text: sentence[first.start..last.end].to_string(),
                        salience: window.iter().map(|w| self.word_weight(w.text)).sum(),
                        method: self.config.method.to_string(),
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.salience
                .total_cmp(&a.salience)
                .then(a.start.cmp(&b.start))
                .then(a.end.cmp(&b.end))
        });

        let mut selected: Vec<Span> = Vec::new();
        for candidate in candidates {
            if selected.len() >= max_spans {
                break;
            }
            if selected.iter().all(|s| !s.overlaps(&candidate)) {
                selected.push(candidate);
            }
        }

        if let Some(top) = selected.first().map(|s| s.salience) {
            for span in &mut selected {
                span.salience /= top;
            }
        }
        selected
    }
}

impl Default for MicroSpanExtractor {
    fn default() -> Self {
        Self::new(SpanExtractorConfig::default(), None)
    }
}

/// Runs of adjacent content words (separated only by spaces or hyphens).
fn content_runs(sentence: &str) -> Vec<Vec<Word<'_>>> {
    let mut runs: Vec<Vec<Word<'_>>> = Vec::new();
    let mut current: Vec<Word<'_>> = Vec::new();

    for word in text::words(sentence) {
        let is_content = word.text.chars().any(char::is_alphabetic)
            && !patterns::is_stopword(&word.lowercase());
        let adjacent = current.last().is_some_and(|prev| {
            sentence[prev.end..word.start]
                .chars()
                .all(|c| c == ' ' || c == '-')
        });

        if (!is_content || !adjacent) && !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
        if is_content {
            current.push(word);
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}
