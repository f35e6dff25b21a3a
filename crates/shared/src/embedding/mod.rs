//! Embedding providers.
//!
//! A provider turns article texts into unit-norm dense vectors. The remote
//! backend is preferred when configured; the local TF-IDF backend is always
//! available and takes over for the rest of the run once the remote one fails.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::error::ExternalError;
use crate::openai::OpenAiClient;

pub mod remote;
pub mod tfidf;

pub use remote::RemoteEmbeddingBackend;
pub use tfidf::LocalTfidfBackend;

const NORM_EPSILON: f64 = 1e-10;

/// Capability interface for anything that can embed a batch of texts
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Return one vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExternalError>;
}

/// L2-normalize each row in place, with a small epsilon in the denominator
pub fn normalize_rows(rows: &mut [Vec<f32>]) {
    for row in rows.iter_mut() {
        let norm = row
            .iter()
            .map(|v| f64::from(*v) * f64::from(*v))
            .sum::<f64>()
            .sqrt();
        let denom = norm + NORM_EPSILON;
        for v in row.iter_mut() {
            *v = (f64::from(*v) / denom) as f32;
        }
    }
}

/// Cosine similarity of two unit-norm vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

/// Picks between the remote backend and the local fallback
pub struct EmbeddingProvider {
    primary: Option<Box<dyn EmbeddingBackend>>,
    fallback: LocalTfidfBackend,
    max_remote_items: usize,
    primary_failed: AtomicBool,
}

impl EmbeddingProvider {
    pub fn new(
        primary: Option<Box<dyn EmbeddingBackend>>,
        fallback: LocalTfidfBackend,
        max_remote_items: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            max_remote_items,
            primary_failed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let primary: Option<Box<dyn EmbeddingBackend>> = match &config.api {
            Some(api) if config.remote_embeddings_enabled() => {
                let client = OpenAiClient::new(api.clone(), &config.retry)?;
                Some(Box::new(RemoteEmbeddingBackend::new(
                    client,
                    config.embedding.model.clone(),
                    config.embedding.batch_size,
                    config.retry,
                )))
            }
            _ => None,
        };

        Ok(Self::new(
            primary,
            LocalTfidfBackend::default(),
            config.embedding.max_remote_items,
        ))
    }

    /// Embed `texts`, never failing.
    ///
    /// The whole batch comes from a single backend.
    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        if let Some(primary) = &self.primary {
            if self.primary_failed.load(Ordering::Relaxed) {
                tracing::debug!(backend = primary.name(), "remote embeddings disabled for this run");
            } else if texts.len() > self.max_remote_items {
                tracing::info!(
                    items = texts.len(),
                    cap = self.max_remote_items,
                    "too many items for remote embeddings, using TF-IDF"
                );
            } else {
                tracing::info!(backend = primary.name(), items = texts.len(), "using remote embeddings");
                match primary.embed(texts).await {
                    Ok(mut vectors) if vectors.len() == texts.len() => {
                        normalize_rows(&mut vectors);
                        return vectors;
                    }
                    Ok(vectors) => {
                        let e = ExternalError::Shape {
                            expected: texts.len(),
                            got: vectors.len(),
                        };
                        tracing::warn!(error = %e, "remote embeddings failed, using TF-IDF");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "remote embeddings failed, using TF-IDF");
                    }
                }
                self.primary_failed.store(true, Ordering::Relaxed);
            }
        }

        tracing::info!(items = texts.len(), "using TF-IDF embeddings (fallback)");
        self.fallback.fit_transform(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct FakeBackend {
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExternalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExternalError::Transport("offline".into()));
            }
            Ok(texts.iter().map(|_| vec![3.0, 4.0]).collect())
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("budget vote number {}", i)).collect()
    }

    #[test]
    fn test_normalize_rows_unit_norm() {
        let mut rows = vec![vec![3.0, 4.0], vec![0.0, 0.0]];
        normalize_rows(&mut rows);
        assert!((rows[0][0] - 0.6).abs() < 1e-6);
        assert!((rows[0][1] - 0.8).abs() < 1e-6);
        assert_eq!(rows[1], vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity_of_unit_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_primary_used_and_normalized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = EmbeddingProvider::new(
            Some(Box::new(FakeBackend { fail: false, calls: calls.clone() })),
            LocalTfidfBackend::default(),
            10,
        );

        let vectors = provider.embed(&texts(3)).await;
        assert_eq!(vectors.len(), 3);
        assert!((vectors[0][0] - 0.6).abs() < 1e-6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_over_cap_skips_primary() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = EmbeddingProvider::new(
            Some(Box::new(FakeBackend { fail: false, calls: calls.clone() })),
            LocalTfidfBackend::default(),
            2,
        );

        let vectors = provider.embed(&texts(3)).await;
        assert_eq!(vectors.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_disables_primary_for_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = EmbeddingProvider::new(
            Some(Box::new(FakeBackend { fail: true, calls: calls.clone() })),
            LocalTfidfBackend::default(),
            10,
        );

        assert_eq!(provider.embed(&texts(3)).await.len(), 3);
        assert_eq!(provider.embed(&texts(2)).await.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let provider = EmbeddingProvider::new(None, LocalTfidfBackend::default(), 10);
        assert!(provider.embed(&[]).await.is_empty());
    }
}
