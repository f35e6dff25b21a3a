use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EmbeddingBackend;
use crate::config::RetryPolicy;
use crate::error::ExternalError;
use crate::openai::OpenAiClient;
use crate::retry::retry_with_backoff;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Batched calls to an OpenAI-compatible `/embeddings` endpoint
pub struct RemoteEmbeddingBackend {
    client: OpenAiClient,
    model: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl RemoteEmbeddingBackend {
    pub fn new(client: OpenAiClient, model: String, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            client,
            model,
            batch_size: batch_size.max(1),
            retry,
        }
    }
}

#[async_trait]
impl EmbeddingBackend for RemoteEmbeddingBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExternalError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = EmbeddingRequest {
                model: &self.model,
                input: batch,
            };
            let client = &self.client;
            let request = &request;

            let response: EmbeddingResponse = retry_with_backoff(&self.retry, "embeddings", move || {
                client.post_json("embeddings", request)
            })
            .await?;

            vectors.extend(order_batch(response.data, batch.len())?);
        }

        Ok(vectors)
    }
}

/// Put a batch back into input order using each item's `index`
fn order_batch(mut items: Vec<EmbeddingItem>, expected: usize) -> Result<Vec<Vec<f32>>, ExternalError> {
    if items.len() != expected {
        return Err(ExternalError::Shape {
            expected,
            got: items.len(),
        });
    }

    items.sort_by_key(|item| item.index);
    if items.iter().enumerate().any(|(pos, item)| item.index != pos) {
        return Err(ExternalError::Malformed(
            "embedding indices do not cover the batch".to_string(),
        ));
    }

    Ok(items.into_iter().map(|item| item.embedding).collect())
}
