use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use regex::Regex;
use stop_words::{get, LANGUAGE};

use super::{normalize_rows, EmbeddingBackend};
use crate::error::ExternalError;

/// Sparse term-frequency vectorizer fit on the current batch.
///
/// Unigrams and bigrams over stopword-filtered tokens, weighted by smoothed
/// inverse document frequency, each row L2-normalized.
pub struct LocalTfidfBackend {
    stopwords: HashSet<String>,
    token_pattern: Regex,
    max_features: usize,
    max_df: f64,
}

impl Default for LocalTfidfBackend {
    fn default() -> Self {
        Self::new(8000, 0.95)
    }
}

impl LocalTfidfBackend {
    pub fn new(max_features: usize, max_df: f64) -> Self {
        let stopwords = get(LANGUAGE::English)
            .iter()
            .map(|s| s.to_string())
            .collect();

        Self {
            stopwords,
            token_pattern: Regex::new(r"\b\w\w+\b").expect("static pattern compiles"),
            max_features,
            max_df,
        }
    }

    fn terms(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = self
            .token_pattern
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|t| !self.stopwords.contains(*t))
            .collect();

        let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
        terms
    }

    /// Fit the vocabulary on `texts` and return their unit-norm rows
    pub fn fit_transform(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let n_docs = texts.len();
        if n_docs == 0 {
            return Vec::new();
        }

        let counts: Vec<HashMap<String, usize>> = texts
            .iter()
            .map(|text| {
                let mut doc = HashMap::new();
                for term in self.terms(text) {
                    *doc.entry(term).or_insert(0) += 1;
                }
                doc
            })
            .collect();

        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        let mut corpus_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in &counts {
            for (term, count) in doc {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                *corpus_freq.entry(term.as_str()).or_insert(0) += count;
            }
        }

        // A single document would lose every term to the max_df bound
        let max_doc_count = if n_docs < 2 {
            usize::MAX
        } else {
            (self.max_df * n_docs as f64).floor() as usize
        };

        let mut kept: Vec<(&str, usize)> = corpus_freq
            .into_iter()
            .filter(|(term, _)| doc_freq[term] <= max_doc_count)
            .collect();
        if kept.len() > self.max_features {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            kept.truncate(self.max_features);
        }

        let mut vocabulary: Vec<&str> = kept.into_iter().map(|(term, _)| term).collect();
        vocabulary.sort_unstable();

        let idf: Vec<f64> = vocabulary
            .iter()
            .map(|term| {
                let df = doc_freq[term] as f64;
                ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let mut rows: Vec<Vec<f32>> = counts
            .iter()
            .map(|doc| {
                vocabulary
                    .iter()
                    .zip(idf.iter())
                    .map(|(term, weight)| {
                        let tf = doc.get(*term).copied().unwrap_or(0) as f64;
                        (tf * weight) as f32
                    })
                    .collect()
            })
            .collect();

        normalize_rows(&mut rows);
        rows
    }
}

#[async_trait]
impl EmbeddingBackend for LocalTfidfBackend {
    fn name(&self) -> &str {
        "tfidf"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExternalError> {
        Ok(self.fit_transform(texts))
    }
}
