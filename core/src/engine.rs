//! The search engine: one instance owns the index gate, the result cache and
//! the corpus loader, and is shared by reference across request handlers.

use crate::cache::{CacheKey, QueryKey, ResultCache};
use crate::config::EngineConfig;
use crate::corpus::{CorpusLoader, CorpusSource, Document, DocumentTable, JsonCorpusSource};
use crate::error::Result;
use crate::fuzzy::expand_term;
use crate::gate::{GateState, IndexGate};
use crate::highlight::{highlight, Highlight};
use crate::index::{InvertedIndex, TermId};
use crate::scoring::{Bm25Scorer, EarlyTermination, WeightedTerm};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Optional per-request restrictions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchFilters {
    /// Only documents from this collection id.
    pub collection: Option<String>,
    /// Only documents with this grade (case-insensitive).
    pub grade: Option<String>,
    /// Edit distance tolerance for this request, overriding the configured one.
    pub fuzzy: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub hadith: Document,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightedDocument {
    #[serde(flatten)]
    pub scored: ScoredDocument,
    pub highlights: Vec<Highlight>,
}

/// Documents and their index, always built and swapped together.
pub struct IndexSnapshot {
    pub generation: u64,
    pub table: DocumentTable,
    pub index: InvertedIndex,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub state: GateState,
    pub generation: u64,
    pub builds: usize,
    pub documents: usize,
    pub vocabulary: usize,
    pub avg_doc_len: f64,
    pub unavailable_collections: Vec<String>,
    pub cache_len: usize,
    pub cache_capacity: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

type CachedResults = Arc<[HighlightedDocument]>;

pub struct SearchEngine {
    config: EngineConfig,
    tokenizer: Tokenizer,
    loader: CorpusLoader,
    gate: IndexGate<IndexSnapshot>,
    cache: ResultCache<CachedResults>,
}

impl SearchEngine {
    /// Construction is cheap: nothing is read until the first query or [`warm`](Self::warm).
    pub fn new(source: Arc<dyn CorpusSource>, config: EngineConfig) -> Self {
        Self {
            tokenizer: Tokenizer::new(config.tokenizer.clone()),
            loader: CorpusLoader::new(source),
            gate: IndexGate::new(),
            cache: ResultCache::new(config.cache_capacity),
            config,
        }
    }

    pub fn from_data_dir<P: AsRef<Path>>(dir: P, config: EngineConfig) -> Self {
        Self::new(Arc::new(JsonCorpusSource::new(dir)), config)
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Ranked documents, best first. An empty or unsearchable query yields an
    /// empty list; only an unavailable index is an error.
    pub fn search(&self, query: &str, limit: Option<usize>, filters: &SearchFilters) -> Result<Vec<ScoredDocument>> {
        let results = self.run(query, limit, filters)?;
        Ok(results.iter().map(|h| h.scored.clone()).collect())
    }

    /// Same ranking as [`search`](Self::search), with match spans over each body.
    pub fn search_advanced(
        &self,
        query: &str,
        limit: Option<usize>,
        filters: &SearchFilters,
    ) -> Result<Vec<HighlightedDocument>> {
        Ok(self.run(query, limit, filters)?.to_vec())
    }

    /// Direct retrieval by collection, book number and book reference.
    pub fn lookup(&self, collection: &str, book: &str, reference: &str) -> Result<Document> {
        let snapshot = self.snapshot()?;
        snapshot.table.get_by_reference(collection, book, reference).cloned()
    }

    /// Build the index now instead of on the first query.
    pub fn warm(&self) -> Result<()> {
        self.snapshot().map(|_| ())
    }

    /// Reload the corpus and swap in a freshly built index.
    pub fn rebuild(&self) -> Result<u64> {
        let snapshot = self.gate.rebuild(|generation| self.build_snapshot(generation))?;
        self.cache.clear();
        Ok(snapshot.generation)
    }

    pub fn stats(&self) -> EngineStats {
        let current = self.gate.current();
        EngineStats {
            state: self.gate.state(),
            generation: self.gate.generation(),
            builds: self.gate.builds(),
            documents: current.as_ref().map_or(0, |s| s.table.len()),
            vocabulary: current.as_ref().map_or(0, |s| s.index.vocabulary_size()),
            avg_doc_len: current.as_ref().map_or(0.0, |s| s.index.avg_doc_len()),
            unavailable_collections: current
                .as_ref()
                .map(|s| s.table.unavailable_collections().to_vec())
                .unwrap_or_default(),
            cache_len: self.cache.len(),
            cache_capacity: self.cache.capacity(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
        }
    }

    fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        self.gate.get_or_build(|generation| self.build_snapshot(generation))
    }

    fn build_snapshot(&self, generation: u64) -> Result<IndexSnapshot> {
        let start = Instant::now();
        tracing::info!(generation, "building search index");
        let table = self.loader.load().map_err(|e| {
            tracing::error!(generation, error = %e, "corpus load failed");
            e
        })?;
        let index = InvertedIndex::build(&table, &self.tokenizer);
        tracing::info!(
            generation,
            docs = table.len(),
            terms = index.vocabulary_size(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search index ready"
        );
        Ok(IndexSnapshot { generation, table, index })
    }

    fn run(&self, query: &str, limit: Option<usize>, filters: &SearchFilters) -> Result<CachedResults> {
        let empty: CachedResults = Arc::from(Vec::new());
        let key = match QueryKey::parse(query, &self.tokenizer) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(error = %e, "returning no results");
                return Ok(empty);
            }
        };
        let limit = limit.unwrap_or(self.config.default_limit).min(self.config.max_limit);
        if limit == 0 {
            return Ok(empty);
        }
        let fuzzy = filters
            .fuzzy
            .map_or(self.config.fuzzy.max_distance, |f| f.min(self.config.fuzzy.max_request_distance));
        let mut cache_key = CacheKey {
            generation: self.gate.generation(),
            query: key,
            limit,
            collection: filters.collection.clone(),
            grade: filters.grade.as_deref().map(str::to_lowercase),
            fuzzy,
        };
        if cache_key.generation > 0 {
            if let Some(hit) = self.cache.get(&cache_key) {
                tracing::debug!(query = %cache_key.query, "cache hit");
                return Ok(hit);
            }
        }

        let snapshot = self.snapshot()?;
        let results: CachedResults = self.execute(&snapshot, &cache_key, filters).into();
        cache_key.generation = snapshot.generation;
        self.cache.put(cache_key, results.clone());
        Ok(results)
    }

    /// Phase one ranks over postings only; phase two hydrates and highlights
    /// just the surviving `limit` documents.
    fn execute(&self, snapshot: &IndexSnapshot, key: &CacheKey, filters: &SearchFilters) -> Vec<HighlightedDocument> {
        let index = &snapshot.index;
        let table = &snapshot.table;

        let expansions: Vec<Vec<(TermId, f64)>> = key
            .query
            .terms()
            .iter()
            .map(|term| expand_term(index, term, key.fuzzy, &self.config.fuzzy))
            .collect();
        // Query terms that are each other's neighbours resolve to the same
        // index term; it counts once, at its best weight.
        let mut best: HashMap<TermId, f64> = HashMap::new();
        for &(term, weight) in expansions.iter().flatten() {
            let w = best.entry(term).or_insert(weight);
            *w = w.max(weight);
        }
        let terms: Vec<WeightedTerm> = best.into_iter().map(|(term, weight)| WeightedTerm { term, weight }).collect();

        let scorer = Bm25Scorer::new(index, self.config.bm25)
            .with_sample_limit(self.config.posting_sample_limit)
            .with_sample_min_df(self.config.posting_sample_min_df);
        let early = self
            .config
            .early_termination
            .then_some(EarlyTermination { threshold: self.config.relevance_threshold });
        let grade = key.grade.as_deref();
        let ranking = if filters.collection.is_none() && grade.is_none() {
            scorer.rank(&terms, key.limit, early, |_| true)
        } else {
            scorer.rank(&terms, key.limit, early, |doc| {
                table.get(doc).is_some_and(|d| {
                    filters.collection.as_deref().map_or(true, |c| d.collection_id == c)
                        && grade.map_or(true, |g| d.grade.as_deref().is_some_and(|dg| dg.eq_ignore_ascii_case(g)))
                })
            })
        };
        tracing::debug!(
            query = %key.query,
            candidates = ranking.candidates,
            hits = ranking.hits.len(),
            terminated_early = ranking.terminated_early,
            "scored"
        );

        let groups: Vec<Vec<String>> = expansions
            .iter()
            .map(|group| group.iter().map(|&(tid, _)| index.term(tid).to_string()).collect())
            .collect();
        ranking
            .hits
            .into_iter()
            .filter_map(|(doc_id, score)| {
                let doc = table.get(doc_id)?;
                let highlights = highlight(&doc.body, &groups, &self.tokenizer, &self.config.highlight);
                Some(HighlightedDocument {
                    scored: ScoredDocument { hadith: doc.clone(), score },
                    highlights,
                })
            })
            .collect()
    }
}
