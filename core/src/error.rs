//! Error taxonomy shared by every layer of the engine.

use thiserror::Error;

/// Errors surfaced by the corpus loader, the index gate and the search engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The corpus source is missing or malformed. When `collection` is set the
    /// failure is scoped to that collection only and the loader degrades it to
    /// zero documents.
    #[error("corpus data unavailable{}: {reason}", .collection.as_deref().map(|c| format!(" for collection '{c}'")).unwrap_or_default())]
    DataUnavailable {
        collection: Option<String>,
        reason: String,
    },
    /// The index build failed or has not completed.
    #[error("search index unavailable: {0}")]
    IndexUnavailable(String),
    /// A direct lookup matched no document.
    #[error("no hadith found for {collection}/{book}/{reference}")]
    NotFound {
        collection: String,
        book: String,
        reference: String,
    },
    /// The query normalized to nothing searchable.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// A configuration file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn data_unavailable(collection: Option<&str>, reason: impl Into<String>) -> Self {
        EngineError::DataUnavailable {
            collection: collection.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// True when the failure only affects one collection.
    pub fn is_collection_scoped(&self) -> bool {
        matches!(
            self,
            EngineError::DataUnavailable {
                collection: Some(_),
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
