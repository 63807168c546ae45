//! Standard BM25 lexical scoring, built fresh per call from the Rerank
//! candidate set rather than a persisted global-corpus index (§4.6).

use std::collections::HashMap;

use uuid::Uuid;

const K1: f32 = 1.5;
const B: f32 = 0.75;

pub struct Bm25Index {
    doc_term_freqs: HashMap<Uuid, HashMap<String, u32>>,
    doc_lengths: HashMap<Uuid, usize>,
    doc_freq: HashMap<String, usize>,
    avg_doc_len: f32,
    num_docs: usize,
}

impl Bm25Index {
    pub fn build(documents: &HashMap<Uuid, Vec<String>>) -> Self {
        let mut doc_term_freqs = HashMap::new();
        let mut doc_lengths = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for (doc_id, tokens) in documents {
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lengths.insert(*doc_id, tokens.len());
            total_len += tokens.len();
            doc_term_freqs.insert(*doc_id, term_freqs);
        }

        let num_docs = documents.len();
        let avg_doc_len = if num_docs > 0 {
            total_len as f32 / num_docs as f32
        } else {
            0.0
        };

        Self {
            doc_term_freqs,
            doc_lengths,
            doc_freq,
            avg_doc_len,
            num_docs,
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.num_docs as f32;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Scores every document against a tokenized query. Absent terms
    /// contribute `0`; the result is unsorted.
    pub fn score_all(&self, query_tokens: &[String]) -> HashMap<Uuid, f32> {
        let mut scores = HashMap::with_capacity(self.doc_term_freqs.len());

        for (doc_id, term_freqs) in &self.doc_term_freqs {
            let doc_len = *self.doc_lengths.get(doc_id).unwrap_or(&0) as f32;
            let mut score = 0.0f32;

            for term in query_tokens {
                let Some(&freq) = term_freqs.get(term) else {
                    continue;
                };
                let freq = freq as f32;
                let idf = self.idf(term);
                let denom = freq + K1 * (1.0 - B + B * doc_len / self.avg_doc_len.max(1.0));
                score += idf * (freq * (K1 + 1.0)) / denom;
            }

            scores.insert(*doc_id, score);
        }

        scores
    }

    /// Documents ranked by BM25 score, descending, ties broken by id.
    pub fn rank(&self, query_tokens: &[String]) -> Vec<(Uuid, f32)> {
        let scores = self.score_all(query_tokens);
        let mut ranked: Vec<(Uuid, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn document_with_more_query_term_occurrences_ranks_higher() {
        let relevant = Uuid::new_v4();
        let irrelevant = Uuid::new_v4();
        let mut docs = HashMap::new();
        docs.insert(relevant, doc(&["machine", "learning", "machine", "learning", "intro"]));
        docs.insert(irrelevant, doc(&["unrelated", "topic", "entirely", "different"]));

        let index = Bm25Index::build(&docs);
        let ranked = index.rank(&doc(&["machine", "learning"]));

        assert_eq!(ranked[0].0, relevant);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn query_terms_absent_from_the_corpus_score_zero_everywhere() {
        let a = Uuid::new_v4();
        let mut docs = HashMap::new();
        docs.insert(a, doc(&["alpha", "beta"]));
        let index = Bm25Index::build(&docs);
        let scores = index.score_all(&doc(&["gamma"]));
        assert_eq!(scores.get(&a).copied(), Some(0.0));
    }
}
