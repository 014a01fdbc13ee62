//! Salient term ranking for whole texts.
//!
//! The ranking method is pluggable through [`SalienceRanker`]; results are
//! cached per provider instance, keyed on the normalized text and the number
//! of requested units.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cache::BoundedCache;
use crate::text::{self, patterns};

/// A ranked term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalienceUnit {
    pub unit: String,
    pub weight: f64,
}

/// Ranked terms of a text, highest weight first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalienceResult {
    pub method: String,
    pub units: Vec<SalienceUnit>,
}

impl SalienceResult {
    pub fn contains(&self, unit: &str) -> bool {
        self.units.iter().any(|u| u.unit == unit)
    }
}

/// A term ranking method.
pub trait SalienceRanker: Send + Sync {
    /// Method name reported in results.
    fn name(&self) -> &str;

    /// Weight each distinct word. Words arrive lowercase, stop-words removed,
    /// in text order.
    fn rank(&self, words: &[String]) -> Vec<(String, f64)>;
}

/// Term frequency relative to the most frequent term.
#[derive(Debug, Clone, Default)]
pub struct FrequencyRanker;

impl SalienceRanker for FrequencyRanker {
    fn name(&self) -> &str {
        "frequency"
    }

    fn rank(&self, words: &[String]) -> Vec<(String, f64)> {
        let mut counts: HashMap<&str, f64> = HashMap::new();
        for word in words {
            *counts.entry(word.as_str()).or_insert(0.0) += 1.0;
        }
        let max = counts.values().copied().fold(0.0, f64::max);
        counts
            .into_iter()
            .map(|(w, c)| (w.to_string(), if max > 0.0 { c / max } else { 0.0 }))
            .collect()
    }
}

/// Frequency weighted toward terms that appear early in the text.
#[derive(Debug, Clone, Default)]
pub struct PositionalRanker;

impl SalienceRanker for PositionalRanker {
    fn name(&self) -> &str {
        "positional"
    }

    fn rank(&self, words: &[String]) -> Vec<(String, f64)> {
        let n = words.len().max(1) as f64;
        let mut scores: HashMap<&str, f64> = HashMap::new();
        for (idx, word) in words.iter().enumerate() {
            *scores.entry(word.as_str()).or_insert(0.0) += 1.0 / (1.0 + idx as f64 / n);
        }
        let max = scores.values().copied().fold(0.0, f64::max);
        scores
            .into_iter()
            .map(|(w, s)| (w.to_string(), if max > 0.0 { s / max } else { 0.0 }))
            .collect()
    }
}

/// Default number of cached results per provider.
pub const DEFAULT_SALIENCE_CACHE_CAPACITY: usize = 256;

/// Ranks salient terms in a text, with an LRU cache.
pub struct SalienceProvider {
    ranker: Box<dyn SalienceRanker>,
    cache: BoundedCache<(String, usize), SalienceResult>,
}

impl SalienceProvider {
    pub fn new(ranker: Box<dyn SalienceRanker>, cache_capacity: usize) -> Self {
        Self {
            ranker,
            cache: BoundedCache::new(cache_capacity),
        }
    }

    /// Provider backed by [`FrequencyRanker`].
    pub fn frequency(cache_capacity: usize) -> Self {
        Self::new(Box::new(FrequencyRanker), cache_capacity)
    }

    /// Provider for a built-in method name (`frequency`, `positional`).
    pub fn for_method(method: &str, cache_capacity: usize) -> Option<Self> {
        let ranker: Box<dyn SalienceRanker> = match method.trim().to_ascii_lowercase().as_str() {
            "frequency" => Box::new(FrequencyRanker),
            "positional" => Box::new(PositionalRanker),
            _ => return None,
        };
        Some(Self::new(ranker, cache_capacity))
    }

    pub fn method(&self) -> &str {
        self.ranker.name()
    }

    /// Rank the `max_units` most salient terms of `input`.
    pub fn extract(&self, input: &str, max_units: usize) -> SalienceResult {
        let normalized = text::normalize(input);
        if normalized.is_empty() || max_units == 0 {
            return SalienceResult {
                method: self.method().to_string(),
                units: Vec::new(),
            };
        }

        self.cache
            .get_or_insert_with((normalized.clone(), max_units), || self.compute(&normalized, max_units))
    }

    fn compute(&self, normalized: &str, max_units: usize) -> SalienceResult {
        let words: Vec<String> = text::lowercase_words(normalized)
            .into_iter()
            .filter(|w| {
                w.chars().count() > 1
                    && w.chars().any(char::is_alphabetic)
                    && !patterns::is_stopword(w)
            })
            .collect();

        let mut units: Vec<SalienceUnit> = self
            .ranker
            .rank(&words)
            .into_iter()
            .map(|(unit, weight)| SalienceUnit { unit, weight })
            .collect();
        units.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.unit.cmp(&b.unit)));
        units.truncate(max_units);

        SalienceResult {
            method: self.method().to_string(),
            units,
        }
    }

    /// Number of cached results.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Maximum number of cached results.
    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Cache keys from least to most recently used.
    pub fn cache_keys(&self) -> Vec<(String, usize)> {
        self.cache.keys()
    }
}

impl Default for SalienceProvider {
    fn default() -> Self {
        Self::frequency(DEFAULT_SALIENCE_CACHE_CAPACITY)
    }
}
