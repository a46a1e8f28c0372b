//! Ollama embedding provider.
//!
//! Calls Ollama's `/api/embeddings` endpoint once per text. Every request
//! runs under the configured `RetryPolicy`, so transient failures are
//! retried with backoff and slow responses surface as provider timeouts.

use crate::embeddings::Embedder;
use askroute_core::{AppError, AppResult};
use askroute_llm::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, instrument};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Ollama embedding provider using local API
#[derive(Debug)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    policy: RetryPolicy,

    /// Learned from the first response; 0 until then
    dimensions: AtomicUsize,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaEmbedder {
    /// Create a provider for `model` at `base_url`.
    ///
    /// No request is sent until the first embedding is needed.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        policy: RetryPolicy,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| {
                AppError::Provider(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            policy,
            dimensions: AtomicUsize::new(0),
        })
    }

    /// Embed single text (no retries)
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);

            return Err(AppError::Provider(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse Ollama response: {}", e)))?;

        self.check_dimensions(body.embedding.len())?;
        Ok(body.embedding)
    }

    fn check_dimensions(&self, got: usize) -> AppResult<()> {
        match self
            .dimensions
            .compare_exchange(0, got, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Ok(()),
            Err(expected) if expected == got => Ok(()),
            Err(expected) => Err(AppError::Provider(format!(
                "Unexpected embedding dimensions from '{}': got {}, expected {}",
                self.model, got, expected
            ))),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::SeqCst)
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        // Ollama has no batch endpoint; texts are embedded sequentially
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            if text.trim().is_empty() {
                return Err(AppError::Validation("Cannot embed empty text".to_string()));
            }
            let embedding = self
                .policy
                .run("embed", || self.embed_single(text))
                .await?;
            embeddings.push(embedding);
        }

        debug!("Embedded batch of {} texts", embeddings.len());
        Ok(embeddings)
    }
}
