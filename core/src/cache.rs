//! Result cache with strict LRU eviction, keyed by a canonical form of the query.

use crate::error::{EngineError, Result};
use crate::tokenizer::Tokenizer;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sorted, deduplicated query terms. Queries that differ only in term order,
/// repetition, case or punctuation share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    terms: Vec<String>,
}

impl QueryKey {
    pub fn parse(query: &str, tokenizer: &Tokenizer) -> Result<Self> {
        let mut terms = tokenizer.tokenize(query);
        terms.sort_unstable();
        terms.dedup();
        if terms.is_empty() {
            return Err(EngineError::InvalidQuery(format!("no searchable terms in {query:?}")));
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[String] { &self.terms }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.terms.join(" "))
    }
}

/// Everything that changes the result list for a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub generation: u64,
    pub query: QueryKey,
    pub limit: usize,
    pub collection: Option<String>,
    pub grade: Option<String>,
    pub fuzzy: u8,
}

pub struct ResultCache<V> {
    inner: Mutex<LruCache<CacheKey, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ResultCache<V> {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(capacity)), hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    /// A hit promotes the entry to most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let found = self.inner.lock().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Inserting beyond capacity evicts the least recently used entry first.
    pub fn put(&self, key: CacheKey, value: V) {
        self.inner.lock().put(key, value);
    }

    pub fn clear(&self) { self.inner.lock().clear(); }

    pub fn len(&self) -> usize { self.inner.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn capacity(&self) -> usize { self.inner.lock().cap().get() }

    pub fn hits(&self) -> u64 { self.hits.load(Ordering::Relaxed) }

    pub fn misses(&self) -> u64 { self.misses.load(Ordering::Relaxed) }
}

impl<V> fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("len", &self.inner.lock().len())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(q: &str) -> CacheKey {
        CacheKey {
            generation: 1,
            query: QueryKey::parse(q, &Tokenizer::default()).unwrap(),
            limit: 10,
            collection: None,
            grade: None,
            fuzzy: 0,
        }
    }

    #[test]
    fn query_key_ignores_order_repetition_and_case() {
        let tok = Tokenizer::default();
        let a = QueryKey::parse("Prayer fasting", &tok).unwrap();
        let b = QueryKey::parse("fasting, PRAYER prayer!", &tok).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "fasting prayer");
    }

    #[test]
    fn empty_query_is_invalid() {
        let tok = Tokenizer::default();
        assert!(matches!(QueryKey::parse("", &tok), Err(EngineError::InvalidQuery(_))));
        assert!(matches!(QueryKey::parse(" ?! ", &tok), Err(EngineError::InvalidQuery(_))));
    }

    #[test]
    fn respects_capacity_and_evicts_lru() {
        let cache = ResultCache::new(3);
        cache.put(key("a"), 1);
        cache.put(key("b"), 2);
        cache.put(key("c"), 3);
        // touch "a" so "b" becomes least recently used
        assert_eq!(cache.get(&key("a")), Some(1));
        cache.put(key("d"), 4);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&key("b")), None);
        assert_eq!(cache.get(&key("a")), Some(1));
        assert_eq!(cache.get(&key("c")), Some(3));
        assert_eq!(cache.get(&key("d")), Some(4));
    }

    #[test]
    fn counts_hits_and_misses() {
        let cache = ResultCache::new(2);
        assert!(cache.get(&key("x")).is_none());
        cache.put(key("x"), "v");
        assert!(cache.get(&key("x")).is_some());
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn generation_separates_entries() {
        let cache = ResultCache::new(4);
        cache.put(key("a"), 1);
        let mut next = key("a");
        next.generation = 2;
        assert!(cache.get(&next).is_none());
    }
}
