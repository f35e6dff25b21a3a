use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::{Criterion, ImportanceScores};
use crate::config::RetryPolicy;
use crate::error::ExternalError;
use crate::openai::OpenAiClient;
use crate::retry::retry_with_backoff;

/// A higher-quality, best-effort source of importance scores
#[async_trait]
pub trait ImportanceRater: Send + Sync {
    /// Rate a capped text bundle on all seven criteria
    async fn rate(&self, bundle: &str) -> Result<ImportanceScores, ExternalError>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

/// Asks a chat-completion model for the seven scores as strict JSON
pub struct ExternalRater {
    client: OpenAiClient,
    model: String,
    retry: RetryPolicy,
    semaphore: Arc<Semaphore>,
}

impl ExternalRater {
    pub fn new(client: OpenAiClient, model: String, retry: RetryPolicy) -> Self {
        // Keep concurrent rating calls low to stay under rate limits
        let semaphore = Arc::new(Semaphore::new(2));

        Self {
            client,
            model,
            retry,
            semaphore,
        }
    }

    fn request(&self, bundle: &str) -> ChatRequest {
        let keys: Vec<&str> = Criterion::ALL.iter().map(|c| c.as_str()).collect();
        let prompt = format!(
            "Rate this news story on seven 1-10 scales. \
             Return ONLY JSON with keys: {}. \
             No prose, no comments.\n\nSTORY:\n{}\n",
            keys.join(", "),
            bundle
        );

        ChatRequest {
            model: self.model.clone(),
            max_tokens: 200,
            temperature: 0.0,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: "You are an editor scoring news importance. Output JSON only.".to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
        }
    }
}

#[async_trait]
impl ImportanceRater for ExternalRater {
    async fn rate(&self, bundle: &str) -> Result<ImportanceScores, ExternalError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ExternalError::Transport(e.to_string()))?;

        let request = self.request(bundle);
        let client = &self.client;
        let request = &request;

        let response: ChatResponse = retry_with_backoff(&self.retry, "importance rating", move || {
            client.post_json("chat/completions", request)
        })
        .await?;

        let text = response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ExternalError::Malformed("no choices in response".to_string()))?;

        parse_ratings(text)
    }
}

/// Parse a JSON object holding exactly the seven criteria.
///
/// Any other shape is rejected as a whole; values are clamped to [0, 10].
pub fn parse_ratings(text: &str) -> Result<ImportanceScores, ExternalError> {
    let value: serde_json::Value =
        serde_json::from_str(text.trim()).map_err(|e| ExternalError::Malformed(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ExternalError::Malformed("expected a JSON object".to_string()))?;

    let mut scores = ImportanceScores::default();
    for criterion in Criterion::ALL {
        let raw = object
            .get(criterion.as_str())
            .ok_or_else(|| ExternalError::MissingKey(criterion.as_str().to_string()))?;
        let number = raw.as_f64().ok_or_else(|| {
            ExternalError::Malformed(format!("`{}` is not a number", criterion))
        })?;
        scores.set(criterion, number);
    }

    if object.len() != Criterion::ALL.len() {
        return Err(ExternalError::Malformed(format!(
            "expected {} keys, got {}",
            Criterion::ALL.len(),
            object.len()
        )));
    }

    Ok(scores)
}
