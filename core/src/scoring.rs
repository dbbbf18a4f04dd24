//! BM25 scoring over posting lists.
//!
//! - IDF: ln(1 + (N - df + 0.5) / (df + 0.5))
//! - Score: Σ IDF * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * |d| / avgdl))
//!
//! Only documents that appear in at least one query term's postings are ever
//! touched, so query cost follows the matching postings rather than the corpus.

use crate::config::Bm25Params;
use crate::corpus::DocId;
use crate::index::{InvertedIndex, TermId};
use std::cmp::Ordering;
use std::collections::HashMap;

pub fn idf(num_docs: u32, df: u32) -> f64 {
    let n = num_docs as f64;
    let df = df as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Contribution of one term to one document.
pub fn term_score(tf: u32, doc_len: u32, avg_doc_len: f64, idf: f64, params: &Bm25Params) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    let tf = tf as f64;
    let len_ratio = if avg_doc_len > 0.0 { doc_len as f64 / avg_doc_len } else { 1.0 };
    let norm = params.k1 * (1.0 - params.b + params.b * len_ratio);
    idf * (tf * (params.k1 + 1.0)) / (tf + norm)
}

/// Descending score, then ascending doc id.
pub fn by_rank(a: &(DocId, f64), b: &(DocId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// A query term resolved against the index, with its match weight
/// (1.0 exact, below 1.0 for fuzzy neighbours).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedTerm {
    pub term: TermId,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct EarlyTermination {
    /// Stop once the `limit`-th best candidate scores above this.
    pub threshold: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Top documents, best first.
    pub hits: Vec<(DocId, f64)>,
    /// Number of distinct documents that received a score.
    pub candidates: usize,
    /// Whether scoring stopped before every query term was processed.
    pub terminated_early: bool,
}

pub struct Bm25Scorer<'a> {
    index: &'a InvertedIndex,
    params: Bm25Params,
    sample_limit: Option<usize>,
    sample_min_df: u32,
}

impl<'a> Bm25Scorer<'a> {
    pub fn new(index: &'a InvertedIndex, params: Bm25Params) -> Self {
        Self { index, params, sample_limit: None, sample_min_df: 0 }
    }

    /// Score at most `limit` postings per term.
    pub fn with_sample_limit(mut self, limit: Option<usize>) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Only terms with at least `min_df` postings are subject to the sample limit.
    pub fn with_sample_min_df(mut self, min_df: u32) -> Self {
        self.sample_min_df = min_df;
        self
    }

    /// Largest contribution `wt` can add to any single document: the BM25
    /// saturation bound `idf * (k1 + 1)`, scaled by the match weight.
    pub fn score_ceiling(&self, wt: &WeightedTerm) -> f64 {
        let idf = idf(self.index.num_docs(), self.index.doc_freq(wt.term));
        wt.weight * idf * (self.params.k1 + 1.0)
    }

    /// Full BM25 score of a single document, without early termination.
    pub fn score_document(&self, terms: &[WeightedTerm], doc: DocId) -> f64 {
        let n = self.index.num_docs();
        terms
            .iter()
            .map(|wt| {
                let tf = self
                    .index
                    .postings(wt.term)
                    .binary_search_by_key(&doc, |p| p.doc_id)
                    .map(|i| self.index.postings(wt.term)[i].tf)
                    .unwrap_or(0);
                let idf = idf(n, self.index.doc_freq(wt.term));
                wt.weight * term_score(tf, self.index.doc_len(doc), self.index.avg_doc_len(), idf, &self.params)
            })
            .sum()
    }

    /// Phase one of a search: score every posting of the query terms (rarest
    /// term first) for documents accepted by `filter`, and return the best
    /// `limit` as (doc, score).
    ///
    /// With `early` set, after each term the candidate pool is checked. The
    /// remaining (more common) terms are skipped once the pool holds more than
    /// `3 * limit` documents, the `limit`-th best exceeds the threshold, and no
    /// document outside the current top `limit` (scored or not) could overtake
    /// it even by matching every remaining term at its ceiling.
    pub fn rank<F>(&self, terms: &[WeightedTerm], limit: usize, early: Option<EarlyTermination>, filter: F) -> Ranking
    where
        F: Fn(DocId) -> bool,
    {
        if limit == 0 || terms.is_empty() {
            return Ranking::default();
        }
        let n = self.index.num_docs();
        let avgdl = self.index.avg_doc_len();

        let mut ordered: Vec<&WeightedTerm> = terms.iter().collect();
        ordered.sort_by_key(|wt| (self.index.doc_freq(wt.term), wt.term));

        // ceilings[i]: the most any document can still gain from terms i.. onward
        let mut ceilings = vec![0.0; ordered.len() + 1];
        for i in (0..ordered.len()).rev() {
            ceilings[i] = ceilings[i + 1] + self.score_ceiling(ordered[i]);
        }

        let mut scores: HashMap<DocId, f64> = HashMap::new();
        let mut terminated_early = false;
        for (i, wt) in ordered.iter().enumerate() {
            let df = self.index.doc_freq(wt.term);
            let idf = idf(n, df);
            let postings = self.index.postings(wt.term);
            let take = match self.sample_limit {
                Some(cap) if df >= self.sample_min_df => cap,
                _ => postings.len(),
            };
            for p in postings.iter().take(take) {
                if !filter(p.doc_id) {
                    continue;
                }
                let s = term_score(p.tf, self.index.doc_len(p.doc_id), avgdl, idf, &self.params);
                *scores.entry(p.doc_id).or_insert(0.0) += wt.weight * s;
            }

            let remaining = ordered.len() - i - 1;
            if let Some(early) = early {
                if remaining > 0 && scores.len() > limit.saturating_mul(3) {
                    let top = top_k(scores.iter().map(|(d, s)| (*d, *s)).collect(), limit.saturating_mul(2));
                    let kth = top[limit - 1].1;
                    let challenger = top.get(limit).map_or(0.0, |c| c.1);
                    if kth > early.threshold && kth > challenger + ceilings[i + 1] {
                        tracing::debug!(candidates = scores.len(), skipped_terms = remaining, "early termination");
                        terminated_early = true;
                        break;
                    }
                }
            }
        }

        let candidates = scores.len();
        let hits = top_k(scores.into_iter().collect(), limit);
        Ranking { hits, candidates, terminated_early }
    }
}

/// The best `k` entries, sorted by [`by_rank`].
fn top_k(mut all: Vec<(DocId, f64)>, k: usize) -> Vec<(DocId, f64)> {
    if all.len() > k && k > 0 {
        all.select_nth_unstable_by(k - 1, by_rank);
        all.truncate(k);
    }
    all.truncate(k);
    all.sort_unstable_by(by_rank);
    all
}
