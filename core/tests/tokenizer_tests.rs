use hadith_core::config::TokenizerConfig;
use hadith_core::tokenizer::Tokenizer;

#[test]
fn it_normalizes_and_folds_diacritics() {
    let words = Tokenizer::default().tokenize("Running Runners RUN! The café's menu, Ṣalāh.");
    assert!(words.contains(&"running".to_string()));
    // Unicode normalization: café -> cafe, Ṣalāh -> salah
    assert!(words.contains(&"cafe's".to_string()));
    assert!(words.contains(&"salah".to_string()));
}

#[test]
fn it_keeps_diacritics_when_folding_is_off() {
    let tok = Tokenizer::new(TokenizerConfig { fold_diacritics: false, ..Default::default() });
    assert_eq!(tok.tokenize("Ṣalāh"), vec!["ṣalāh".to_string()]);
}

#[test]
fn it_stems_when_configured() {
    let tok = Tokenizer::new(TokenizerConfig { stem: true, ..Default::default() });
    let words = tok.tokenize("Running runs");
    assert_eq!(words, vec!["run".to_string(), "run".to_string()]);
}

#[test]
fn it_filters_stopwords_when_configured() {
    let tok = Tokenizer::new(TokenizerConfig { remove_stopwords: true, ..Default::default() });
    let words = tok.tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(words.contains(&"fox".to_string()));
}

#[test]
fn empty_and_punctuation_only_input_yield_nothing() {
    let tok = Tokenizer::default();
    assert!(tok.tokenize("").is_empty());
    assert!(tok.tokenize("  ,.;!?  -- ").is_empty());
}

#[test]
fn tokenization_is_deterministic() {
    let tok = Tokenizer::default();
    let text = "Whoever believes in Allah and the Last Day, let him speak good or keep silent.";
    assert_eq!(tok.tokenize(text), tok.tokenize(text));
}

#[test]
fn arabic_tashkeel_is_folded() {
    // "بِسْمِ" with harakat folds to the bare letters "بسم"
    let words = Tokenizer::default().tokenize("بِسْمِ اللَّهِ");
    assert_eq!(words[0], "بسم");
}
