//! Corpus loading: the source abstraction, the JSON data directory reader and the
//! immutable in-memory document table.

use crate::error::{EngineError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
}

impl CollectionInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// One hadith as delivered by a [`CorpusSource`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HadithRecord {
    pub book_no: u32,
    pub book_name: String,
    pub hadith_number: String,
    pub narrator: String,
    pub body: String,
    pub body_ar: String,
    pub reference: String,
    pub grade: Option<String>,
    /// Text to index. Falls back to narrator and body when absent.
    pub searchable_text: Option<String>,
}

/// Immutable, loaded document. Serializes with the field names the web
/// front-end consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    #[serde(skip)]
    pub id: DocId,
    pub collection_id: String,
    #[serde(rename = "collection")]
    pub collection_name: String,
    #[serde(rename = "hadith_no")]
    pub hadith_number: String,
    pub book_no: u32,
    #[serde(rename = "book_en")]
    pub book_name: String,
    #[serde(rename = "narrator_en")]
    pub narrator: String,
    #[serde(rename = "body_en")]
    pub body: String,
    pub body_ar: String,
    #[serde(rename = "book_ref_no")]
    pub reference: String,
    pub grade: Option<String>,
    #[serde(skip)]
    pub searchable_text: String,
}

/// Where documents come from. Implementations must be safe to call from the
/// thread that performs the index build.
pub trait CorpusSource: Send + Sync {
    fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
    fn read_documents(&self, collection: &CollectionInfo) -> Result<Vec<HadithRecord>>;

    /// Called once every collection has been read, so a source can drop any
    /// state it kept for the duration of a load.
    fn finish_load(&self) {}
}

/// All loaded documents, addressable by dense id or by (collection, book, reference).
#[derive(Debug, Default)]
pub struct DocumentTable {
    docs: Vec<Document>,
    by_reference: HashMap<(String, u32, String), DocId>,
    collections: Vec<CollectionInfo>,
    unavailable: Vec<String>,
}

impl DocumentTable {
    /// Assign ids in a deterministic order: collections by id, books by number,
    /// hadiths in source order.
    pub fn from_collections(mut collections: Vec<(CollectionInfo, Vec<HadithRecord>)>) -> Self {
        collections.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        let mut table = DocumentTable::default();
        for (info, mut records) in collections {
            records.sort_by_key(|r| r.book_no);
            for rec in records {
                let id = table.docs.len() as DocId;
                let searchable_text = rec
                    .searchable_text
                    .unwrap_or_else(|| format!("{} {}", rec.narrator, rec.body));
                table
                    .by_reference
                    .entry((info.id.clone(), rec.book_no, rec.reference.trim().to_string()))
                    .or_insert(id);
                table.docs.push(Document {
                    id,
                    collection_id: info.id.clone(),
                    collection_name: info.name.clone(),
                    book_no: rec.book_no,
                    book_name: rec.book_name,
                    hadith_number: rec.hadith_number,
                    narrator: rec.narrator,
                    body: rec.body,
                    body_ar: rec.body_ar,
                    reference: rec.reference,
                    grade: rec.grade,
                    searchable_text,
                });
            }
            table.collections.push(info);
        }
        table
    }

    pub fn get(&self, id: DocId) -> Option<&Document> { self.docs.get(id as usize) }

    /// Direct lookup by the human-facing reference triple.
    pub fn get_by_reference(&self, collection: &str, book: &str, reference: &str) -> Result<&Document> {
        let not_found = || EngineError::NotFound {
            collection: collection.to_string(),
            book: book.to_string(),
            reference: reference.to_string(),
        };
        let book_no: u32 = book.trim().parse().map_err(|_| not_found())?;
        let key = (collection.to_string(), book_no, reference.trim().to_string());
        self.by_reference
            .get(&key)
            .and_then(|id| self.get(*id))
            .ok_or_else(not_found)
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Document> { self.docs.iter() }

    pub fn collections(&self) -> &[CollectionInfo] { &self.collections }

    /// Collections that failed to load and were degraded to zero documents.
    pub fn unavailable_collections(&self) -> &[String] { &self.unavailable }
}

/// Reads every configured collection into a [`DocumentTable`].
#[derive(Clone)]
pub struct CorpusLoader {
    source: Arc<dyn CorpusSource>,
}

impl CorpusLoader {
    pub fn new(source: Arc<dyn CorpusSource>) -> Self { Self { source } }

    /// A failure to list collections is fatal; a failure to read one collection
    /// only empties that collection.
    pub fn load(&self) -> Result<DocumentTable> {
        let infos = self.source.list_collections()?;
        let mut loaded = Vec::with_capacity(infos.len());
        let mut unavailable = Vec::new();
        for info in infos {
            match self.source.read_documents(&info) {
                Ok(records) => {
                    tracing::debug!(collection = %info.id, docs = records.len(), "collection loaded");
                    loaded.push((info, records));
                }
                Err(err) => {
                    tracing::warn!(collection = %info.id, error = %err, "collection unavailable, indexing it as empty");
                    unavailable.push(info.id.clone());
                    loaded.push((info, Vec::new()));
                }
            }
        }
        self.source.finish_load();
        let mut table = DocumentTable::from_collections(loaded);
        unavailable.sort();
        table.unavailable = unavailable;
        Ok(table)
    }
}

// --- JSON data directory ---

#[derive(Deserialize)]
struct CollectionsFile {
    collections: Vec<CollectionEntry>,
}

#[derive(Deserialize)]
struct CollectionEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct SearchIndexFile {
    #[serde(default)]
    collections: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(default)]
    books: BTreeMap<String, RawBook>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBook {
    #[serde(default)]
    book_name: String,
    #[serde(default)]
    hadiths: Vec<RawHadith>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHadith {
    #[serde(default, deserialize_with = "loose_string")]
    hadith_number: String,
    #[serde(default)]
    english_narrated: String,
    #[serde(default)]
    english_text: String,
    #[serde(default)]
    arabic_text: String,
    #[serde(default, deserialize_with = "loose_string")]
    book_reference: String,
    #[serde(default)]
    searchable_text: Option<String>,
    #[serde(default)]
    grade: Option<String>,
}

/// Accept numbers, strings or null for identifier-like fields.
fn loose_string<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Reads `collections.json` and `search-index.json` from a data directory.
///
/// The combined index file is parsed once per [`CorpusSource::list_collections`]
/// call and each collection is decoded lazily from it, so a malformed collection
/// only affects itself. The parsed tree is released in
/// [`CorpusSource::finish_load`].
pub struct JsonCorpusSource {
    root: PathBuf,
    parsed: Mutex<Option<Arc<HashMap<String, Value>>>>,
}

impl JsonCorpusSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), parsed: Mutex::new(None) }
    }

    fn collections_path(&self) -> PathBuf { self.root.join("collections.json") }
    fn search_index_path(&self) -> PathBuf { self.root.join("search-index.json") }

    fn read_search_index(&self) -> Result<Arc<HashMap<String, Value>>> {
        let path = self.search_index_path();
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::data_unavailable(None, format!("{}: {e}", path.display())))?;
        let file: SearchIndexFile = serde_json::from_str(&raw)
            .map_err(|e| EngineError::data_unavailable(None, format!("{}: {e}", path.display())))?;
        let parsed = Arc::new(file.collections);
        *self.parsed.lock() = Some(parsed.clone());
        Ok(parsed)
    }

    fn read_collection_names(&self) -> Vec<CollectionEntry> {
        let path = self.collections_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str::<CollectionsFile>(&raw) {
            Ok(file) => file.collections,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed collections metadata");
                Vec::new()
            }
        }
    }
}

impl CorpusSource for JsonCorpusSource {
    fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let index = self.read_search_index()?;
        let mut infos: BTreeMap<String, CollectionInfo> = index
            .keys()
            .map(|id| (id.clone(), CollectionInfo::new(id.clone(), id.clone())))
            .collect();
        for entry in self.read_collection_names() {
            let name = entry.name.unwrap_or_else(|| entry.id.clone());
            infos.insert(entry.id.clone(), CollectionInfo::new(entry.id, name));
        }
        Ok(infos.into_values().collect())
    }

    fn read_documents(&self, collection: &CollectionInfo) -> Result<Vec<HadithRecord>> {
        let cached = self.parsed.lock().clone();
        let index = match cached {
            Some(index) => index,
            None => self.read_search_index()?,
        };
        let value = index.get(&collection.id).ok_or_else(|| {
            EngineError::data_unavailable(Some(collection.id.as_str()), "missing from search-index.json")
        })?;
        let raw = RawCollection::deserialize(value)
            .map_err(|e| EngineError::data_unavailable(Some(collection.id.as_str()), e.to_string()))?;

        let mut records = Vec::new();
        for (book_key, book) in raw.books {
            let Ok(book_no) = book_key.trim().parse::<u32>() else {
                tracing::warn!(collection = %collection.id, book = %book_key, "skipping book with non-numeric key");
                continue;
            };
            for h in book.hadiths {
                records.push(HadithRecord {
                    book_no,
                    book_name: book.book_name.clone(),
                    hadith_number: h.hadith_number,
                    narrator: h.english_narrated,
                    body: h.english_text,
                    body_ar: h.arabic_text,
                    reference: h.book_reference,
                    grade: h.grade,
                    searchable_text: h.searchable_text,
                });
            }
        }
        Ok(records)
    }

    fn finish_load(&self) {
        self.parsed.lock().take();
    }
}

/// In-memory corpus, for tests and embedding.
#[derive(Default)]
pub struct MemorySource {
    collections: Vec<(CollectionInfo, Vec<HadithRecord>)>,
    unavailable: Vec<CollectionInfo>,
    failure: Option<String>,
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn with_collection(mut self, info: CollectionInfo, records: Vec<HadithRecord>) -> Self {
        self.collections.push((info, records));
        self
    }

    /// List a collection whose documents cannot be read.
    pub fn with_unavailable(mut self, info: CollectionInfo) -> Self {
        self.unavailable.push(info);
        self
    }

    /// Make the whole source unreadable.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }
}

impl CorpusSource for MemorySource {
    fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        if let Some(reason) = &self.failure {
            return Err(EngineError::data_unavailable(None, reason.clone()));
        }
        Ok(self
            .collections
            .iter()
            .map(|(info, _)| info.clone())
            .chain(self.unavailable.iter().cloned())
            .collect())
    }

    fn read_documents(&self, collection: &CollectionInfo) -> Result<Vec<HadithRecord>> {
        self.collections
            .iter()
            .find(|(info, _)| info.id == collection.id)
            .map(|(_, records)| records.clone())
            .ok_or_else(|| EngineError::data_unavailable(Some(collection.id.as_str()), "collection not readable"))
    }
}
