use crate::corpus::{DocId, DocumentTable};
use crate::tokenizer::Tokenizer;
use std::collections::HashMap;

pub type TermId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

/// Term -> postings map plus the corpus statistics BM25 needs. Built once per
/// generation and never mutated afterwards.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    dictionary: HashMap<String, TermId>,
    terms: Vec<String>,
    df: Vec<u32>,
    postings: Vec<Vec<Posting>>, // each list sorted by doc_id
    doc_lengths: Vec<u32>,
    num_docs: u32,
    avg_doc_len: f64,
}

impl InvertedIndex {
    /// Tokenize the searchable text of every document and accumulate postings.
    /// Documents are visited in id order, so every posting list comes out
    /// sorted without a separate pass. An empty table yields an empty index.
    pub fn build(table: &DocumentTable, tokenizer: &Tokenizer) -> Self {
        let mut index = InvertedIndex::default();
        let mut tf_counts: HashMap<TermId, u32> = HashMap::new();
        let mut total_len: u64 = 0;

        for doc in table.iter() {
            tf_counts.clear();
            let tokens = tokenizer.tokenize(&doc.searchable_text);
            let doc_len = tokens.len() as u32;
            for term in tokens {
                let tid = index.intern(term);
                *tf_counts.entry(tid).or_insert(0) += 1;
            }
            for (&tid, &tf) in tf_counts.iter() {
                index.postings[tid as usize].push(Posting { doc_id: doc.id, tf });
                index.df[tid as usize] += 1;
            }
            index.doc_lengths.push(doc_len);
            total_len += doc_len as u64;
        }

        index.num_docs = index.doc_lengths.len() as u32;
        index.avg_doc_len = if index.num_docs > 0 { total_len as f64 / index.num_docs as f64 } else { 0.0 };
        index
    }

    fn intern(&mut self, term: String) -> TermId {
        if let Some(&tid) = self.dictionary.get(&term) {
            return tid;
        }
        let tid = self.terms.len() as TermId;
        self.dictionary.insert(term.clone(), tid);
        self.terms.push(term);
        self.df.push(0);
        self.postings.push(Vec::new());
        tid
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> { self.dictionary.get(term).copied() }

    pub fn term(&self, tid: TermId) -> &str { &self.terms[tid as usize] }

    pub fn postings(&self, tid: TermId) -> &[Posting] { &self.postings[tid as usize] }

    pub fn doc_freq(&self, tid: TermId) -> u32 { self.df[tid as usize] }

    /// Frequency of `term` in document `doc`, zero when absent.
    pub fn term_frequency(&self, term: &str, doc: DocId) -> u32 {
        self.term_id(term)
            .and_then(|tid| {
                let list = self.postings(tid);
                list.binary_search_by_key(&doc, |p| p.doc_id).ok().map(|i| list[i].tf)
            })
            .unwrap_or(0)
    }

    pub fn doc_len(&self, doc: DocId) -> u32 { self.doc_lengths.get(doc as usize).copied().unwrap_or(0) }

    pub fn num_docs(&self) -> u32 { self.num_docs }

    pub fn avg_doc_len(&self) -> f64 { self.avg_doc_len }

    pub fn vocabulary_size(&self) -> usize { self.terms.len() }

    /// Every indexed term with its id, in id order.
    pub fn vocabulary(&self) -> impl Iterator<Item = (TermId, &str)> {
        self.terms.iter().enumerate().map(|(i, t)| (i as TermId, t.as_str()))
    }
}
