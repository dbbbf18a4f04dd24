//! Tunable engine parameters.
//!
//! Every field has a default, so a partial JSON file (or none at all) is valid.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest accepted `max_limit`.
pub const MAX_LIMIT_CEILING: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bm25: Bm25Params,
    pub tokenizer: TokenizerConfig,
    pub fuzzy: FuzzyConfig,
    pub highlight: HighlightConfig,
    /// Maximum number of cached result lists.
    pub cache_capacity: usize,
    /// Limit applied when a request does not name one.
    pub default_limit: usize,
    /// Upper bound on any requested limit.
    pub max_limit: usize,
    pub early_termination: bool,
    /// Once the `limit`-th candidate scores above this, remaining terms are skipped.
    pub relevance_threshold: f64,
    /// Cap on postings scored per term; `None` scores every posting.
    pub posting_sample_limit: Option<usize>,
    /// Terms with fewer postings than this are always scored in full.
    pub posting_sample_min_df: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            tokenizer: TokenizerConfig::default(),
            fuzzy: FuzzyConfig::default(),
            highlight: HighlightConfig::default(),
            cache_capacity: 2048,
            default_limit: 50,
            max_limit: 500,
            early_termination: true,
            relevance_threshold: 2.0,
            posting_sample_limit: None,
            posting_sample_min_df: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.bm25.k1 >= 0.0) {
            return Err(EngineError::Config(format!("bm25.k1 must be >= 0, got {}", self.bm25.k1)));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(EngineError::Config(format!("bm25.b must be within [0, 1], got {}", self.bm25.b)));
        }
        if !(self.fuzzy.penalty > 0.0 && self.fuzzy.penalty < 1.0) {
            return Err(EngineError::Config(format!(
                "fuzzy.penalty must be within (0, 1), got {}",
                self.fuzzy.penalty
            )));
        }
        if self.max_limit == 0 || self.max_limit > MAX_LIMIT_CEILING {
            return Err(EngineError::Config(format!(
                "max_limit must be within [1, {MAX_LIMIT_CEILING}], got {}",
                self.max_limit
            )));
        }
        if self.default_limit > self.max_limit {
            return Err(EngineError::Config(format!(
                "default_limit ({}) exceeds max_limit ({})",
                self.default_limit, self.max_limit
            )));
        }
        if self.fuzzy.max_distance > self.fuzzy.max_request_distance {
            return Err(EngineError::Config(format!(
                "fuzzy.max_distance ({}) exceeds fuzzy.max_request_distance ({})",
                self.fuzzy.max_distance, self.fuzzy.max_request_distance
            )));
        }
        if self.cache_capacity == 0 {
            return Err(EngineError::Config("cache_capacity must be positive".into()));
        }
        Ok(())
    }
}

/// BM25 constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Strip combining marks after canonical decomposition (é -> e).
    pub fold_diacritics: bool,
    /// Apply the English Snowball stemmer.
    pub stem: bool,
    pub remove_stopwords: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { fold_diacritics: true, stem: false, remove_stopwords: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Largest edit distance considered a match. Zero disables fuzzy lookup.
    pub max_distance: u8,
    /// Upper bound on the tolerance a single request may ask for.
    pub max_request_distance: u8,
    /// Multiplicative score factor applied once per edit.
    pub penalty: f64,
    /// Query terms shorter than this are only matched exactly.
    pub min_term_len: usize,
    /// Maximum number of index terms a single query term may expand to.
    pub max_expansions: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self { max_distance: 0, max_request_distance: 2, penalty: 0.5, min_term_len: 4, max_expansions: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub max_spans: usize,
    pub max_per_term: usize,
    pub max_terms: usize,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self { max_spans: 10, max_per_term: 3, max_terms: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"bm25": {"k1": 1.2}, "cache_capacity": 16}"#).unwrap();
        assert_eq!(config.bm25.k1, 1.2);
        assert_eq!(config.bm25.b, 0.75);
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.default_limit, 50);
        assert!(config.tokenizer.fold_diacritics);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"bm25": {"b": 1.5}}"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"fuzzy": {"penalty": 1.0}}"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(EngineConfig::from_json_str("not json"), Err(EngineError::Config(_))));
    }

    #[test]
    fn rejects_unbounded_limits() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"max_limit": 18446744073709551615}"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"max_limit": 0}"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"max_limit": 20, "default_limit": 50}"#),
            Err(EngineError::Config(_))
        ));
        assert!(EngineConfig::from_json_str(r#"{"max_limit": 100000}"#).is_ok());
    }

    #[test]
    fn fuzzy_default_must_fit_the_request_ceiling() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"fuzzy": {"max_distance": 3}}"#),
            Err(EngineError::Config(_))
        ));
        assert!(EngineConfig::from_json_str(r#"{"fuzzy": {"max_distance": 3, "max_request_distance": 3}}"#).is_ok());
    }
}
