//! Ollama chat provider (`POST /api/chat`, non-streaming).

use crate::client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use askroute_core::{AppError, AppResult};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    message: ChatMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Client whose HTTP requests are bounded by `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_body<'a>(request: &'a LlmRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: request.temperature.map(|temperature| ChatOptions { temperature }),
        }
    }
}

fn status_error(status: StatusCode, model: &str, body: &str) -> AppError {
    if status == StatusCode::NOT_FOUND {
        AppError::Provider(format!(
            "Ollama has no model '{}' (run `ollama pull {}`): {}",
            model, model, body
        ))
    } else {
        AppError::Provider(format!("Ollama API error ({}): {}", status, body))
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(
        skip(self, request),
        fields(model = %request.model, messages = request.messages.len())
    )]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&Self::chat_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Provider(format!("Ollama request timed out: {}", e))
                } else {
                    AppError::Provider(format!(
                        "Failed to reach Ollama at {}: {}",
                        self.base_url, e
                    ))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, &request.model, &body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse Ollama response: {}", e)))?;

        let usage = LlmUsage {
            prompt_tokens: chat.prompt_eval_count.unwrap_or(0),
            completion_tokens: chat.eval_count.unwrap_or(0),
        };
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Received chat completion"
        );

        Ok(LlmResponse {
            content: chat.message.content,
            model: chat.model,
            usage,
        })
    }
}
