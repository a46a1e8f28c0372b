//! LLM provider factory.
//!
//! Creates LLM clients from a provider name and its resolved endpoint.

use crate::client::LlmClient;
use crate::providers::{ollama::DEFAULT_OLLAMA_URL, OllamaClient};
use askroute_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `timeout` - Upper bound for a single HTTP request
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown, or
/// `AppError::Provider` if the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
            let client = OllamaClient::with_timeout(base_url, timeout)?;
            tracing::debug!("Created Ollama client for {}", base_url);
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}
