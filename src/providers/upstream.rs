use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::config::ProxyConfig;
use crate::transcript::Turn;

/// Body forwarded to the completion API.
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Turn],
    pub max_tokens: u32,
}

/// Status and decoded body exactly as the completion API returned them.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("completion transport failed: {0}")]
    Transport(String),
    #[error("completion body unreadable ({status}): {message}")]
    Decode { status: StatusCode, message: String },
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
}

impl UpstreamClient {
    pub fn new(url: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: model.into(),
            max_tokens,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(&config.upstream_url, &config.model, config.max_tokens)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one completion call. Any HTTP status is a successful relay;
    /// only transport failures and non-JSON bodies are errors.
    pub async fn complete(
        &self,
        api_key: &str,
        messages: &[Turn],
    ) -> std::result::Result<UpstreamReply, UpstreamError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let body = serde_json::from_slice::<Value>(&body).map_err(|e| UpstreamError::Decode {
            status,
            message: e.to_string(),
        })?;

        Ok(UpstreamReply { status, body })
    }
}
