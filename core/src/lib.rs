//! In-process full-text search over a hadith corpus: BM25 ranking over an
//! inverted index built lazily on first use, with an LRU result cache.

pub mod cache;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod gate;
pub mod highlight;
pub mod index;
pub mod scoring;
pub mod tokenizer;

pub use config::EngineConfig;
pub use corpus::{CollectionInfo, CorpusSource, DocId, Document, HadithRecord, JsonCorpusSource, MemorySource};
pub use engine::{EngineStats, HighlightedDocument, ScoredDocument, SearchEngine, SearchFilters};
pub use error::EngineError;
pub use index::{InvertedIndex, Posting, TermId};
