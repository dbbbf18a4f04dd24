use crate::config::TokenizerConfig;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{M}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// A normalized term together with the byte range it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub start: usize,
    pub end: usize,
}

/// Turns raw text into normalized terms. Matching runs over the original text so
/// offsets stay valid for highlighting; each match is then NFKC-normalized,
/// lowercased, optionally diacritic-folded, filtered and stemmed.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self { Self { config } }

    pub fn config(&self) -> &TokenizerConfig { &self.config }

    /// Normalized terms in document order. Empty input yields an empty vector.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokens(text).into_iter().map(|t| t.term).collect()
    }

    /// Normalized terms with their byte offsets into `text`.
    pub fn tokens(&self, text: &str) -> Vec<Token> {
        let mut out = Vec::new();
        for mat in RE.find_iter(text) {
            let raw = mat.as_str().trim_end_matches(['\'', '_']);
            if raw.is_empty() { continue; }
            if let Some(term) = self.normalize_term(raw) {
                out.push(Token { term, start: mat.start(), end: mat.start() + raw.len() });
            }
        }
        out
    }

    /// Normalize a single already-split word. Returns `None` for stopwords and
    /// words that normalize to nothing.
    pub fn normalize_term(&self, raw: &str) -> Option<String> {
        let folded: String = if self.config.fold_diacritics {
            raw.nfkd().filter(|c| !is_combining_mark(*c)).nfc().collect()
        } else {
            raw.nfkc().collect()
        };
        let lowered = folded.to_lowercase();
        let word = lowered.trim_matches(|c: char| !c.is_alphanumeric());
        if word.is_empty() { return None; }
        if self.config.remove_stopwords && is_stopword(word) { return None; }
        if self.config.stem {
            Some(STEMMER.stem(word).into_owned())
        } else {
            Some(word.to_string())
        }
    }
}
