//! Word complexity from corpus frequencies.
//!
//! Complexity is `1 - ln(1 + f) / ln(1 + f_max)`: the most frequent word in
//! the table scores 0.0, rarer words score higher, and a word that is not in
//! the table scores 1.0, at least as complex as the rarest known word.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Embedded multilingual frequency table (word, count per million).
const DEFAULT_FREQUENCIES: &str = include_str!("../data/frequencies.tsv");

/// Errors that can occur when loading a frequency table.
#[derive(Error, Debug)]
pub enum FrequencyTableError {
    #[error("Failed to read frequency table: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed frequency table line {line}: {content}")]
    MalformedLine { line: usize, content: String },
}

/// Static mapping of lowercase word to corpus frequency.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    counts: HashMap<String, u64>,
    max_count: u64,
}

impl FrequencyTable {
    /// Build a table from `(word, count)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut counts = HashMap::new();
        for (word, count) in pairs {
            let entry = counts.entry(word.as_ref().to_lowercase()).or_insert(0);
            *entry = count.max(*entry);
        }
        let max_count = counts.values().copied().max().unwrap_or(0);
        Self { counts, max_count }
    }

    /// Parse `word<TAB or spaces>count` lines. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Result<Self, FrequencyTableError> {
        let mut pairs = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut parts = trimmed.split_whitespace();
            let parsed = match (parts.next(), parts.next(), parts.next()) {
                (Some(word), Some(count), None) => count.parse::<u64>().ok().map(|c| (word, c)),
                _ => None,
            };
            match parsed {
                Some(pair) => pairs.push(pair),
                None => {
                    return Err(FrequencyTableError::MalformedLine {
                        line: idx + 1,
                        content: trimmed.to_string(),
                    })
                }
            }
        }
        Ok(Self::from_pairs(pairs))
    }

    /// Load a table from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FrequencyTableError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// The embedded English/Spanish/French table.
    pub fn builtin() -> Self {
        // The embedded table is checked by `test_builtin_table_parses`.
        Self::parse(DEFAULT_FREQUENCIES).unwrap_or_default()
    }

    /// Frequency of a word (case-insensitive).
    pub fn frequency(&self, word: &str) -> Option<u64> {
        self.counts.get(&word.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Scores how hard words are from their corpus frequency.
#[derive(Debug, Clone)]
pub struct LexicalComplexityScorer {
    table: FrequencyTable,
    log_max: f64,
}

impl LexicalComplexityScorer {
    pub fn new(table: FrequencyTable) -> Self {
        let log_max = (1.0 + table.max_count as f64).ln();
        Self { table, log_max }
    }

    pub fn table(&self) -> &FrequencyTable {
        &self.table
    }

    /// Complexity of a word in `[0, 1]`. Unknown words score 1.0.
    pub fn word_complexity(&self, word: &str) -> f64 {
        match self.table.frequency(word) {
            Some(count) if self.log_max > 0.0 => {
                (1.0 - (1.0 + count as f64).ln() / self.log_max).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    /// Mean complexity of a token list (0.0 when empty).
    pub fn mean_complexity<S: AsRef<str>>(&self, tokens: &[S]) -> f64 {
        if tokens.is_empty() {
            return 0.0;
        }
        tokens
            .iter()
            .map(|t| self.word_complexity(t.as_ref()))
            .sum::<f64>()
            / tokens.len() as f64
    }

    /// Average complexity reduction from source to target tokens.
    ///
    /// Returns `(delta, simplified)` where `delta` is the source mean minus
    /// the target mean and `simplified` holds iff `delta > threshold`.
    pub fn compare<S: AsRef<str>, T: AsRef<str>>(
        &self,
        source_tokens: &[S],
        target_tokens: &[T],
        threshold: f64,
    ) -> (f64, bool) {
        let delta = self.mean_complexity(source_tokens) - self.mean_complexity(target_tokens);
        (delta, delta > threshold)
    }
}

impl Default for LexicalComplexityScorer {
    fn default() -> Self {
        Self::new(FrequencyTable::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn spanish_table() -> FrequencyTable {
        FrequencyTable::from_pairs([("usar", 5000u64), ("utilizar", 300), ("casa", 9000)])
    }

    #[test]
    fn test_frequent_word_is_simpler() {
        let scorer = LexicalComplexityScorer::new(spanish_table());
        assert!(scorer.word_complexity("utilizar") > scorer.word_complexity("usar"));
    }

    #[test]
    fn test_oov_is_at_least_rarest_known() {
        let scorer = LexicalComplexityScorer::new(spanish_table());
        let rarest = scorer.word_complexity("utilizar");
        assert!(scorer.word_complexity("desconocidísimo") >= rarest);
        assert_eq!(scorer.word_complexity("desconocidísimo"), 1.0);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let scorer = LexicalComplexityScorer::new(spanish_table());
        assert_eq!(scorer.word_complexity("USAR"), scorer.word_complexity("usar"));
    }

    #[test]
    fn test_compare_detects_simplification() {
        let scorer = LexicalComplexityScorer::new(spanish_table());
        let (delta, simplified) = scorer.compare(&["utilizar"], &["usar"], 0.05);
        assert!(delta > 0.0);
        assert!(simplified);

        let (delta, simplified) = scorer.compare(&["usar"], &["utilizar"], 0.05);
        assert!(delta < 0.0);
        assert!(!simplified);
    }

    #[test]
    fn test_compare_empty_lists() {
        let scorer = LexicalComplexityScorer::new(spanish_table());
        let empty: [&str; 0] = [];
        assert_eq!(scorer.compare(&empty, &empty, 0.0), (0.0, false));
    }

    #[test]
    fn test_empty_table_scores_everything_complex() {
        let scorer = LexicalComplexityScorer::new(FrequencyTable::default());
        assert_eq!(scorer.word_complexity("anything"), 1.0);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        let err = FrequencyTable::parse("usar 10\nbroken line here\n").unwrap_err();
        assert!(matches!(err, FrequencyTableError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_builtin_table_parses() {
        let table = FrequencyTable::parse(DEFAULT_FREQUENCIES).unwrap();
        assert!(table.len() > 100);
        let scorer = LexicalComplexityScorer::new(table);
        assert!(scorer.word_complexity("utilizar") > scorer.word_complexity("usar"));
        assert!(scorer.word_complexity("utilize") > scorer.word_complexity("use"));
    }

    proptest! {
        #[test]
        fn prop_lower_frequency_is_never_simpler(a in 1u64..100_000, b in 1u64..100_000) {
            let scorer = LexicalComplexityScorer::new(FrequencyTable::from_pairs([
                ("alpha", a),
                ("beta", b),
                ("anchor", 200_000),
            ]));
            let (ca, cb) = (scorer.word_complexity("alpha"), scorer.word_complexity("beta"));
            if a < b {
                prop_assert!(ca >= cb);
            } else if b < a {
                prop_assert!(cb >= ca);
            }
        }
    }
}
