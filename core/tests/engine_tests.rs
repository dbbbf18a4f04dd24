use hadith_core::gate::GateState;
use hadith_core::{
    CollectionInfo, EngineConfig, EngineError, HadithRecord, MemorySource, SearchEngine, SearchFilters,
};
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/data")
}

fn fixture_engine() -> SearchEngine {
    SearchEngine::from_data_dir(fixture_dir(), EngineConfig::default())
}

fn no_filters() -> SearchFilters {
    SearchFilters::default()
}

#[test]
fn lookup_returns_fixture_document() {
    let engine = fixture_engine();
    let doc = engine.lookup("bukhari", "1", "1").unwrap();
    assert_eq!(doc.collection_name, "Sahih al-Bukhari");
    assert_eq!(doc.hadith_number, "1");
    assert_eq!(doc.book_name, "Revelation");
    assert!(doc.body.contains("intentions"));

    let other_book = engine.lookup("bukhari", "2", "1").unwrap();
    assert_eq!(other_book.hadith_number, "8");
}

#[test]
fn lookup_missing_reference_is_not_found() {
    let engine = fixture_engine();
    let err = engine.lookup("bukhari", "999999", "1").unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert!(matches!(engine.lookup("nasai", "1", "1"), Err(EngineError::NotFound { .. })));
}

#[test]
fn empty_and_unknown_queries_return_nothing() {
    let engine = fixture_engine();
    assert!(engine.search("", None, &no_filters()).unwrap().is_empty());
    assert!(engine.search("   ...   ", None, &no_filters()).unwrap().is_empty());
    assert!(engine.search("nonexistentterm12345", None, &no_filters()).unwrap().is_empty());
}

#[test]
fn equivalent_queries_share_results_and_cache_entry() {
    let engine = fixture_engine();
    let a = engine.search("prayer fasting", Some(10), &no_filters()).unwrap();
    let b = engine.search("Fasting, PRAYER prayer!", Some(10), &no_filters()).unwrap();
    assert!(!a.is_empty());
    assert_eq!(a, b);
    let stats = engine.stats();
    assert_eq!(stats.cache_len, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[test]
fn results_are_ranked_and_formatted() {
    let engine = fixture_engine();
    let hits = engine.search("prayer", None, &no_filters()).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    let json = serde_json::to_value(&hits[0]).unwrap();
    for field in ["collection_id", "collection", "hadith_no", "book_no", "book_en", "narrator_en", "body_en", "book_ref_no", "score"] {
        assert!(json.get(field).is_some(), "missing {field}");
    }
    assert!(json.get("searchable_text").is_none());
}

#[test]
fn advanced_search_highlights_body_matches() {
    let engine = fixture_engine();
    let hits = engine.search_advanced("intentions reward", Some(5), &no_filters()).unwrap();
    assert_eq!(hits[0].scored.hadith.hadith_number, "1");
    let body: Vec<char> = hits[0].scored.hadith.body.chars().collect();
    assert!(!hits[0].highlights.is_empty());
    for h in &hits[0].highlights {
        let span: String = body[h.start..h.end].iter().collect();
        assert_eq!(span, h.text);
        assert!(["intentions", "reward"].contains(&h.text.to_lowercase().as_str()));
    }
}

#[test]
fn collection_filter_restricts_results() {
    let engine = fixture_engine();
    let filters = SearchFilters { collection: Some("muslim".into()), ..Default::default() };
    let hits = engine.search("prayer", None, &filters).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].hadith.collection_id, "muslim");
}

#[test]
fn fuzzy_tolerance_finds_misspellings() {
    let engine = fixture_engine();
    assert!(engine.search("intentons", None, &no_filters()).unwrap().is_empty());
    let filters = SearchFilters { fuzzy: Some(1), ..Default::default() };
    let hits = engine.search_advanced("intentons", None, &filters).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].highlights[0].text, "intentions");
}

#[test]
fn exact_match_outranks_fuzzy_match() {
    let records = vec![
        HadithRecord { book_no: 1, reference: "1".into(), body: "the fasting person".into(), ..Default::default() },
        HadithRecord { book_no: 1, reference: "2".into(), body: "the feasting person".into(), ..Default::default() },
    ];
    let source = MemorySource::new().with_collection(CollectionInfo::new("c", "C"), records);
    let engine = SearchEngine::new(Arc::new(source), EngineConfig::default());
    let filters = SearchFilters { fuzzy: Some(1), ..Default::default() };
    let hits = engine.search("fasting", None, &filters).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].hadith.reference, "1");
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn request_fuzzy_tolerance_is_capped() {
    let records = vec![
        HadithRecord { book_no: 1, reference: "1".into(), body: "prayer".into(), ..Default::default() },
        HadithRecord { book_no: 1, reference: "2".into(), body: "xylophonequartz".into(), ..Default::default() },
    ];
    let source = MemorySource::new().with_collection(CollectionInfo::new("c", "C"), records);
    let engine = SearchEngine::new(Arc::new(source), EngineConfig::default());

    let wide = SearchFilters { fuzzy: Some(255), ..Default::default() };
    let hits = engine.search("prayer", None, &wide).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].hadith.reference, "1");

    // Anything above the ceiling is the same request as the ceiling itself.
    let capped = SearchFilters { fuzzy: Some(EngineConfig::default().fuzzy.max_request_distance), ..Default::default() };
    engine.search("prayer", None, &capped).unwrap();
    assert_eq!(engine.stats().cache_len, 1);
    assert_eq!(engine.stats().cache_hits, 1);
}

#[test]
fn neighbouring_query_terms_count_once() {
    let records = vec![
        HadithRecord { book_no: 1, reference: "1".into(), body: "give the zakat".into(), ..Default::default() },
        HadithRecord { book_no: 1, reference: "2".into(), body: "give in charity".into(), ..Default::default() },
    ];
    let source = MemorySource::new().with_collection(CollectionInfo::new("c", "C"), records);
    let engine = SearchEngine::new(Arc::new(source), EngineConfig::default());
    let filters = SearchFilters { fuzzy: Some(1), ..Default::default() };

    let single = engine.search("zakat", None, &filters).unwrap();
    let both = engine.search("zakat zakah", None, &filters).unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(both.len(), 1);
    assert!((single[0].score - both[0].score).abs() < 1e-12);
}

#[test]
fn corrupt_collection_degrades_to_empty() {
    let engine = fixture_engine();
    engine.warm().unwrap();
    let stats = engine.stats();
    assert_eq!(stats.state, GateState::Ready);
    assert_eq!(stats.documents, 4);
    assert_eq!(stats.unavailable_collections, vec!["tirmidhi".to_string()]);
}

#[test]
fn unreadable_corpus_fails_fast_without_retrying() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SearchEngine::from_data_dir(dir.path(), EngineConfig::default());
    assert!(matches!(engine.search("prayer", None, &no_filters()), Err(EngineError::IndexUnavailable(_))));
    assert!(matches!(engine.search("fasting", None, &no_filters()), Err(EngineError::IndexUnavailable(_))));
    assert!(matches!(engine.lookup("bukhari", "1", "1"), Err(EngineError::IndexUnavailable(_))));
    let stats = engine.stats();
    assert_eq!(stats.state, GateState::Failed);
    assert_eq!(stats.builds, 1);
    // An unsearchable query never reaches the gate.
    assert!(engine.search("", None, &no_filters()).unwrap().is_empty());
}

#[test]
fn rebuild_recovers_after_data_appears() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SearchEngine::from_data_dir(dir.path(), EngineConfig::default());
    assert!(engine.warm().is_err());
    for file in ["collections.json", "search-index.json"] {
        std::fs::copy(fixture_dir().join(file), dir.path().join(file)).unwrap();
    }
    assert_eq!(engine.rebuild().unwrap(), 1);
    assert_eq!(engine.search("prayer", None, &no_filters()).unwrap().len(), 2);
}

#[test]
fn cache_never_exceeds_capacity() {
    let config = EngineConfig { cache_capacity: 2, ..Default::default() };
    let engine = SearchEngine::from_data_dir(fixture_dir(), config);
    for q in ["prayer", "fasting", "charity"] {
        engine.search(q, None, &no_filters()).unwrap();
    }
    let stats = engine.stats();
    assert_eq!(stats.cache_len, 2);
    assert_eq!(stats.cache_capacity, 2);
}

#[test]
fn concurrent_first_queries_build_once() {
    let engine = Arc::new(fixture_engine());
    let callers = 24;
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|i| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let query = if i % 2 == 0 { "prayer" } else { "faith purification" };
                (i, engine.search(query, Some(10), &SearchFilters::default()).unwrap())
            })
        })
        .collect();

    let expected_prayer = engine.search("prayer", Some(10), &no_filters()).unwrap();
    let expected_faith = engine.search("faith purification", Some(10), &no_filters()).unwrap();
    for h in handles {
        let (i, hits) = h.join().unwrap();
        let expected = if i % 2 == 0 { &expected_prayer } else { &expected_faith };
        assert_eq!(&hits, expected);
    }
    assert_eq!(engine.stats().builds, 1);
}
