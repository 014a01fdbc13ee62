//! Sentence alignment between a source text and its simplification.
//!
//! Each target sentence is assigned to the source sentence that covers the
//! largest share of its content words. A source sentence that receives no
//! target and is not covered by any target sentence is unaligned (a
//! candidate omission). A target sentence with no source is unaligned
//! (added content).

use serde::Serialize;
use std::collections::HashSet;

use super::patterns::is_stopword;

/// One source sentence and the target sentences derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentLink {
    pub source: usize,
    pub targets: Vec<usize>,
    /// Mean coverage of the linked target sentences
    pub score: f64,
}

/// Result of aligning two sentence lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentenceAlignment {
    /// Links ordered by source index
    pub links: Vec<AlignmentLink>,
    /// Source sentences with no counterpart
    pub unaligned_source: Vec<usize>,
    /// Target sentences with no counterpart
    pub unaligned_target: Vec<usize>,
    /// Best coverage of each source sentence by any target sentence
    pub source_coverage: Vec<f64>,
}

impl SentenceAlignment {
    /// The link for a source sentence, if any.
    pub fn link_for(&self, source: usize) -> Option<&AlignmentLink> {
        self.links.iter().find(|l| l.source == source)
    }
}

fn token_set(words: &[String]) -> HashSet<&str> {
    let content: HashSet<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| !is_stopword(w))
        .collect();
    if content.is_empty() {
        words.iter().map(String::as_str).collect()
    } else {
        content
    }
}

/// Share of `part` found in `whole`.
fn coverage(part: &HashSet<&str>, whole: &HashSet<&str>) -> f64 {
    if part.is_empty() {
        return 0.0;
    }
    part.intersection(whole).count() as f64 / part.len() as f64
}

/// Align sentences given as lowercase word lists.
pub fn align_sentences(
    source: &[Vec<String>],
    target: &[Vec<String>],
    threshold: f64,
) -> SentenceAlignment {
    let source_sets: Vec<HashSet<&str>> = source.iter().map(|s| token_set(s)).collect();
    let target_sets: Vec<HashSet<&str>> = target.iter().map(|t| token_set(t)).collect();

    let mut assigned: Vec<Vec<(usize, f64)>> = vec![Vec::new(); source.len()];
    let mut unaligned_target = Vec::new();

    for (t_idx, t_set) in target_sets.iter().enumerate() {
        let best = source_sets
            .iter()
            .enumerate()
            .map(|(s_idx, s_set)| (s_idx, coverage(t_set, s_set)))
            .fold(None::<(usize, f64)>, |best, (s_idx, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((s_idx, score)),
            });

        match best {
            Some((s_idx, score)) if score >= threshold => assigned[s_idx].push((t_idx, score)),
            _ => unaligned_target.push(t_idx),
        }
    }

    let source_coverage: Vec<f64> = source_sets
        .iter()
        .map(|s_set| {
            target_sets
                .iter()
                .map(|t_set| coverage(s_set, t_set))
                .fold(0.0, f64::max)
        })
        .collect();

    let mut links = Vec::new();
    let mut unaligned_source = Vec::new();
    for (s_idx, targets) in assigned.into_iter().enumerate() {
        if targets.is_empty() {
            if source_coverage[s_idx] < threshold {
                unaligned_source.push(s_idx);
            }
            continue;
        }
        let score = targets.iter().map(|(_, s)| s).sum::<f64>() / targets.len() as f64;
        links.push(AlignmentLink {
            source: s_idx,
            targets: targets.into_iter().map(|(t, _)| t).collect(),
            score,
        });
    }

    SentenceAlignment {
        links,
        unaligned_source,
        unaligned_target,
        source_coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::lowercase_words;

    fn sents(items: &[&str]) -> Vec<Vec<String>> {
        items.iter().map(|s| lowercase_words(s)).collect()
    }

    #[test]
    fn test_one_to_one_alignment() {
        let source = sents(&["The committee approved the budget.", "Rain fell all night."]);
        let target = sents(&["The committee approved the budget.", "Rain fell all night."]);
        let alignment = align_sentences(&source, &target, 0.35);
        assert_eq!(alignment.links.len(), 2);
        assert_eq!(alignment.links[0].targets, vec![0]);
        assert!(alignment.unaligned_source.is_empty());
        assert!(alignment.unaligned_target.is_empty());
    }

    #[test]
    fn test_split_sentence_links_to_two_targets() {
        let source = sents(&["The committee approved the budget after a long debate about taxes."]);
        let target = sents(&["The committee approved the budget.", "There was a long debate about taxes."]);
        let alignment = align_sentences(&source, &target, 0.35);
        assert_eq!(alignment.links.len(), 1);
        assert_eq!(alignment.links[0].targets, vec![0, 1]);
    }

    #[test]
    fn test_unaligned_source_and_target() {
        let source = sents(&["The committee approved the budget.", "Historians dispute the archival record."]);
        let target = sents(&["The committee approved the budget.", "Money pays for schools."]);
        let alignment = align_sentences(&source, &target, 0.35);
        assert_eq!(alignment.unaligned_source, vec![1]);
        assert_eq!(alignment.unaligned_target, vec![1]);
    }

    #[test]
    fn test_empty_inputs() {
        let alignment = align_sentences(&[], &[], 0.35);
        assert!(alignment.links.is_empty());
        let source = sents(&["Only source."]);
        let alignment = align_sentences(&source, &[], 0.35);
        assert_eq!(alignment.unaligned_source, vec![0]);
    }
}
