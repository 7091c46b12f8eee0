//! Term-weight vectorizer over item tag lists
//!
//! - tags are lower-cased and joined into one document per item
//! - tokens are whitespace-separated; n-grams join tokens with one space
//! - vocabulary keeps the `max_features` most frequent terms (corpus
//!   frequency, ties alphabetical) and is stored alphabetically
//! - `idf = ln((1 + n) / (1 + df)) + 1`; rows are L2-normalized

use crate::services::interactions::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    max_features: usize,
    ngram_range: (usize, usize),
    vocabulary: Vec<String>,
    idf: Vec<f64>,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self {
            max_features: usize::MAX,
            ngram_range: (1, 1),
            vocabulary: Vec::new(),
            idf: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features.max(1);
        self
    }

    #[must_use]
    pub fn with_ngram_range(mut self, min_n: usize, max_n: usize) -> Self {
        let min_n = min_n.max(1);
        self.ngram_range = (min_n, max_n.max(min_n));
        self
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Column of `term`, if it made it into the vocabulary.
    pub fn term_position(&self, term: &str) -> Option<usize> {
        self.vocabulary
            .binary_search_by(|probe| probe.as_str().cmp(term))
            .ok()
    }

    /// Terms of one tag list, with repeats.
    pub fn analyze(&self, tags: &[String]) -> Vec<String> {
        let doc = tags.join(" ").to_lowercase();
        let tokens: Vec<&str> = doc.split_whitespace().collect();
        let (min_n, max_n) = self.ngram_range;

        let mut terms = Vec::new();
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    /// Learn vocabulary and idf from one tag list per document.
    pub fn fit<T: AsRef<[String]>>(&mut self, documents: &[T]) {
        let mut corpus_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let terms = self.analyze(doc.as_ref());
            let mut distinct: Vec<&String> = terms.iter().collect();
            distinct.sort();
            distinct.dedup();
            for term in distinct {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *corpus_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = corpus_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_features);

        let mut vocabulary: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        vocabulary.sort();

        let n = documents.len() as f64;
        self.idf = vocabulary
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        self.vocabulary = vocabulary;
    }

    /// Weight matrix `documents × vocabulary`. Documents with no known terms
    /// map to all-zero rows.
    pub fn transform<T: AsRef<[String]>>(&self, documents: &[T]) -> CsrMatrix {
        let rows = documents
            .iter()
            .map(|doc| {
                let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
                for term in self.analyze(doc.as_ref()) {
                    if let Some(col) = self.term_position(&term) {
                        *counts.entry(col).or_insert(0.0) += 1.0;
                    }
                }
                counts
                    .into_iter()
                    .map(|(col, tf)| (col, tf * self.idf[col]))
                    .collect()
            })
            .collect();

        let mut matrix = CsrMatrix::from_rows(self.vocabulary.len(), rows);
        matrix.normalize_rows_l2();
        matrix
    }

    pub fn fit_transform<T: AsRef<[String]>>(&mut self, documents: &[T]) -> CsrMatrix {
        self.fit(documents);
        self.transform(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_analyze_lowercases_and_builds_ngrams() {
        let v = TfidfVectorizer::new().with_ngram_range(1, 2);
        let terms = v.analyze(&tags(&["Cats Dogs", "fish"]));
        assert_eq!(
            terms,
            vec!["cats", "dogs", "fish", "cats dogs", "dogs fish"]
        );
    }

    #[test]
    fn test_vocabulary_sorted_and_idf() {
        let docs = vec![tags(&["a", "b"]), tags(&["b", "c"]), tags(&["b"])];
        let mut v = TfidfVectorizer::new();
        v.fit(&docs);
        assert_eq!(v.vocabulary(), &["a", "b", "c"]);
        // b occurs in all three documents
        assert!((v.idf()[1] - 1.0).abs() < 1e-12);
        let expected_a = (4.0f64 / 2.0).ln() + 1.0;
        assert!((v.idf()[0] - expected_a).abs() < 1e-12);
        assert_eq!(v.term_position("c"), Some(2));
        assert_eq!(v.term_position("zzz"), None);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let docs = vec![tags(&["x y z"]), tags(&["y z"]), tags(&["z"])];
        let mut v = TfidfVectorizer::new().with_max_features(2);
        v.fit(&docs);
        assert_eq!(v.vocabulary(), &["y", "z"]);
    }

    #[test]
    fn test_transform_rows_unit_norm_and_empty_rows() {
        let docs = vec![tags(&["a", "b"]), Vec::new(), tags(&["unknown"])];
        let mut v = TfidfVectorizer::new();
        let m = v.fit_transform(&docs[..1]);
        assert_eq!(m.n_rows(), 1);

        let m = v.transform(&docs);
        let norm: f64 = m.row(0).1.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert_eq!(m.row_sum(1), 0.0);
        assert_eq!(m.row_sum(2), 0.0);
    }
}
