use crate::config::HighlightConfig;
use crate::tokenizer::Tokenizer;
use serde::Serialize;

/// A matched region of display text, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Locate query matches in `text`.
///
/// `groups` holds, per query term, the index terms that count as a match for it
/// (the term itself plus any fuzzy neighbours). The display text goes through
/// the same tokenizer as the index, so a span always covers whole words.
pub fn highlight(text: &str, groups: &[Vec<String>], tokenizer: &Tokenizer, config: &HighlightConfig) -> Vec<Highlight> {
    if text.is_empty() || groups.is_empty() {
        return Vec::new();
    }
    let tokens = tokenizer.tokens(text);

    let mut spans: Vec<(usize, usize)> = Vec::new();
    for group in groups.iter().take(config.max_terms) {
        spans.extend(
            tokens
                .iter()
                .filter(|t| group.iter().any(|g| *g == t.term))
                .take(config.max_per_term)
                .map(|t| (t.start, t.end)),
        );
    }
    spans.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    merged
        .into_iter()
        .take(config.max_spans)
        .map(|(start, end)| Highlight {
            start: text[..start].chars().count(),
            end: text[..end].chars().count(),
            text: text[start..end].to_string(),
        })
        .collect()
}
