use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{ApiConfig, RetryPolicy};
use crate::error::ExternalError;

/// Thin JSON client for an OpenAI-compatible API
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api: ApiConfig,
}

impl OpenAiClient {
    pub fn new(api: ApiConfig, retry: &RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(retry.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, api })
    }

    /// POST `body` to `path` and decode the JSON answer
    pub async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ExternalError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.api.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            if status == StatusCode::TOO_MANY_REQUESTS || error_text.contains("insufficient_quota") {
                return Err(ExternalError::RateLimited(error_text));
            }
            return Err(ExternalError::Status {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ExternalError::Malformed(e.to_string()))
    }
}
