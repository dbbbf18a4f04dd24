//! Approximate term matching.
//!
//! Matching is a pure function from (query term, index term) to a weight in
//! `(0, 1]`; the scorer multiplies a term's BM25 contribution by that weight.

use crate::config::FuzzyConfig;
use crate::index::{InvertedIndex, TermId};

/// Edit distance between `a` and `b` if it is at most `max`.
///
/// The length difference is a lower bound on the distance, so far-apart lengths
/// are rejected before any allocation; the DP is abandoned as soon as a whole
/// row exceeds `max`.
pub fn levenshtein_within(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max {
        return None;
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ac) in a.iter().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        let mut min_row = row[0];
        for (j, bc) in b.iter().enumerate() {
            let temp = row[j + 1];
            let cost = usize::from(ac != bc);
            row[j + 1] = (row[j + 1] + 1).min(row[j] + 1).min(prev + cost);
            prev = temp;
            min_row = min_row.min(row[j + 1]);
        }
        if min_row > max {
            return None;
        }
    }
    let dist = row[b.len()];
    (dist <= max).then_some(dist)
}

/// Weight of `candidate` as a match for `query`: 1.0 for an exact match,
/// `penalty^d` for `d` edits within `max_distance`, `None` otherwise.
pub fn similarity(query: &str, candidate: &str, max_distance: usize, penalty: f64) -> Option<f64> {
    if query == candidate {
        return Some(1.0);
    }
    if max_distance == 0 {
        return None;
    }
    levenshtein_within(query, candidate, max_distance).map(|d| penalty.powi(d as i32))
}

/// Index terms that `term` should score against, each with its match weight.
/// The exact term (if indexed) comes first; fuzzy neighbours follow, closest
/// first, capped at `max_expansions`.
pub fn expand_term(index: &InvertedIndex, term: &str, max_distance: u8, config: &FuzzyConfig) -> Vec<(TermId, f64)> {
    let mut out = Vec::new();
    if let Some(tid) = index.term_id(term) {
        out.push((tid, 1.0));
    }
    let max_distance = max_distance as usize;
    if max_distance == 0 || term.chars().count() < config.min_term_len {
        return out;
    }

    let mut neighbours: Vec<(f64, &str, TermId)> = index
        .vocabulary()
        .filter(|(_, candidate)| *candidate != term)
        .filter_map(|(tid, candidate)| {
            similarity(term, candidate, max_distance, config.penalty).map(|w| (w, candidate, tid))
        })
        .collect();
    neighbours.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    out.extend(neighbours.into_iter().take(config.max_expansions).map(|(w, _, tid)| (tid, w)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_single_edits() {
        assert_eq!(levenshtein_within("prayer", "prayer", 0), Some(0));
        assert_eq!(levenshtein_within("prayer", "prayed", 1), Some(1));
        assert_eq!(levenshtein_within("prayer", "praye", 1), Some(1));
        assert_eq!(levenshtein_within("prayer", "prayers", 1), Some(1));
    }

    #[test]
    fn rejects_beyond_bound() {
        assert_eq!(levenshtein_within("a", "abcdef", 1), None);
        assert_eq!(levenshtein_within("fasting", "feasting", 0), None);
        assert_eq!(levenshtein_within("kitten", "sitting", 2), None);
        assert_eq!(levenshtein_within("kitten", "sitting", 3), Some(3));
    }

    #[test]
    fn similarity_penalizes_each_edit() {
        assert_eq!(similarity("zakat", "zakat", 2, 0.5), Some(1.0));
        assert_eq!(similarity("zakat", "zakah", 2, 0.5), Some(0.5));
        assert_eq!(similarity("zakat", "zakaah", 2, 0.5), Some(0.25));
        assert_eq!(similarity("zakat", "zakah", 0, 0.5), None);
    }

    #[test]
    fn unicode_counts_characters() {
        assert_eq!(levenshtein_within("salah", "ṣalāh", 2), Some(2));
    }
}
