//! Embedding capability for the knowledge base.
//!
//! `Embedder` is the narrow interface the indexer and the retriever depend
//! on. Two providers ship: a deterministic offline trigram embedder and an
//! Ollama-backed neural embedder.

pub mod providers;

pub use providers::{OllamaEmbedder, TrigramEmbedder};

use askroute_core::{AppConfig, AppError, AppResult};
use askroute_llm::RetryPolicy;
use std::sync::Arc;

/// Turns text into fixed-length vectors.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Embedding dimensions; 0 while a remote provider has not answered yet.
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Provider("No embedding returned".to_string()))
    }
}

/// Create the embedder selected by configuration.
pub fn create_embedder(config: &AppConfig) -> AppResult<Arc<dyn Embedder>> {
    match config.embedding_provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramEmbedder::new(
            config.rag.embedding_dimensions,
        ))),
        "ollama" => {
            let endpoint = config
                .provider_endpoint("ollama")
                .unwrap_or_else(|| providers::ollama::DEFAULT_OLLAMA_URL.to_string());
            let policy = RetryPolicy::from_settings(&config.retry, &config.timeouts);
            let embedder = OllamaEmbedder::new(endpoint, config.embedding_model(), policy)?;
            Ok(Arc::new(embedder))
        }
        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            other
        ))),
    }
}
