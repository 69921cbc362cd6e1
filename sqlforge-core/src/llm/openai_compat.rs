//! OpenAI-compatible provider for Vertex AI, OpenAI, Ollama and similar
//!
//! Many services offer OpenAI-compatible chat completion APIs with
//! different base URLs and auth conventions; `BackendConfig` captures the
//! differences.

use super::config::BackendConfig;
use super::errors::{LLMError, LLMResult};
use super::traits::LLMProvider;
use super::types::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// OpenAI-compatible provider that can work with multiple services
pub struct OpenAICompatProvider {
    client: Client,
    config: BackendConfig,
}

impl OpenAICompatProvider {
    pub fn new(config: BackendConfig) -> LLMResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(LLMError::config("backend base_url is empty"));
        }
        if config.model.trim().is_empty() {
            return Err(LLMError::config("backend model is empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn api_key(&self) -> LLMResult<Option<String>> {
        match &self.config.api_key_env {
            None => Ok(None),
            Some(var) => std::env::var(var)
                .map(Some)
                .map_err(|_| {
                    let provider = &self.config.provider;
                    LLMError::auth(format!("{provider} API key not found in ${var}"))
                }),
        }
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        sampling: &SamplingConfig,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: sampling.temperature,
            max_tokens: sampling.max_output_tokens,
            top_p: sampling.top_p,
            top_k: (self.config.provider != "openai").then_some(sampling.top_k),
            stream: false,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn is_available(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        sampling: &SamplingConfig,
    ) -> LLMResult<CompletionResponse> {
        let request = self.build_request(messages, sampling);

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')));

        if let Some(api_key) = self.api_key()? {
            req = req.header(&self.config.auth_header, self.config.auth_value(&api_key));
        }

        debug!("Sending completion request to {} ({})", self.config.provider, self.config.model);

        let response = req.json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            warn!("{} returned {}", self.config.provider, status);
            return Err(status_error(status, &body, retry_after));
        }

        let body: ChatCompletionResponse = response.json().await?;
        Ok(body.into())
    }
}

/// Map a non-success HTTP status to a typed error
fn status_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> LLMError {
    let message: String = body.chars().take(500).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LLMError::auth(message),
        StatusCode::TOO_MANY_REQUESTS => LLMError::rate_limit(message, retry_after),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            LLMError::timeout(retry_after.unwrap_or_default())
        }
        _ => LLMError::api(status.as_u16(), message),
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    index: usize,
    message: WireMessage,
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
}

impl From<ChatCompletionResponse> for CompletionResponse {
    fn from(wire: ChatCompletionResponse) -> Self {
        Self {
            id: wire.id,
            model: wire.model,
            choices: wire
                .choices
                .into_iter()
                .map(|c| Choice {
                    index: c.index,
                    message: Message::assistant(c.message.content.unwrap_or_default()),
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage: wire.usage,
        }
    }
}
