//! Text helpers shared by the feature extractor and the stage evaluators.
//!
//! Tokenization, sentence segmentation and sentence alignment. Everything
//! here is a best-effort heuristic that works without any language model.

mod alignment;
pub mod patterns;
mod segmenter;

pub use alignment::{align_sentences, AlignmentLink, SentenceAlignment};
pub use segmenter::split_sentences;

/// A word located in its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Word<'_> {
    pub fn lowercase(&self) -> String {
        self.text.to_lowercase()
    }
}

/// Split text into words with byte offsets.
pub fn words(text: &str) -> Vec<Word<'_>> {
    patterns::WORD_PATTERN
        .find_iter(text)
        .map(|m| Word {
            text: m.as_str(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Lowercased words of a text.
pub fn lowercase_words(text: &str) -> Vec<String> {
    words(text).iter().map(Word::lowercase).collect()
}

/// Lowercased words with stop-words removed.
pub fn content_words(text: &str) -> Vec<String> {
    lowercase_words(text)
        .into_iter()
        .filter(|w| !patterns::is_stopword(w))
        .collect()
}

/// Lowercase and collapse runs of whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prefix of `text` holding at most `max_sentences` sentences.
///
/// Returns the whole text when it has fewer sentences. The prefix is a slice
/// of the original, so byte offsets stay valid.
pub fn sentence_window(text: &str, max_sentences: usize) -> &str {
    let ranges = split_sentences(text);
    if ranges.len() <= max_sentences {
        return text;
    }
    match max_sentences.checked_sub(1).and_then(|last| ranges.get(last)) {
        Some(last) => &text[..last.end],
        None => "",
    }
}

/// Jaccard index of two word sets.
pub fn jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    use std::collections::HashSet;

    let a: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let b: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    intersection / union
}
