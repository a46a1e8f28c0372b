//! Text-generation and classification capabilities.
//!
//! The workflow only sees these two narrow traits. `LlmCapability` backs
//! both with any `LlmClient`, wrapping each call in the configured
//! `RetryPolicy`.

use crate::client::{LlmClient, LlmRequest};
use crate::retry::RetryPolicy;
use askroute_core::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Produces free text from a system instruction and a rendered prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: Option<&str>, prompt: &str) -> AppResult<String>;
}

/// Produces a short raw label for an input under an instruction.
///
/// The label is returned verbatim; interpreting it is the caller's job.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, instruction: &str, input: &str) -> AppResult<String>;
}

/// Sampling temperature for every request.
const TEMPERATURE: f32 = 0.0;

/// Generator and classifier backed by an LLM client.
pub struct LlmCapability {
    client: Arc<dyn LlmClient>,
    model: String,
    policy: RetryPolicy,
}

impl LlmCapability {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            model: model.into(),
            policy,
        }
    }

    async fn complete(
        &self,
        operation: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> AppResult<String> {
        let mut request = LlmRequest::new(self.model.as_str()).with_temperature(TEMPERATURE);
        if let Some(system) = system {
            request = request.with_system(system);
        }
        let request = request.with_user(prompt);

        let response = self
            .policy
            .run(operation, || self.client.complete(&request))
            .await?;
        Ok(response.content)
    }
}

#[async_trait]
impl Generator for LlmCapability {
    async fn generate(&self, system: Option<&str>, prompt: &str) -> AppResult<String> {
        self.complete("generate", system, prompt).await
    }
}

#[async_trait]
impl Classifier for LlmCapability {
    async fn classify(&self, instruction: &str, input: &str) -> AppResult<String> {
        self.complete("classify", Some(instruction), input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LlmResponse, LlmUsage};
    use askroute_core::{AppError, ErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Client that fails a fixed number of times, then echoes the request.
    struct FlakyClient {
        failures_left: AtomicU32,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl FlakyClient {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.seen.lock().unwrap().push(request.clone());
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::Provider("connection refused".into()));
            }
            Ok(LlmResponse {
                content: format!("echo: {}", request.last_user().unwrap_or_default()),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_classify_sends_instruction_as_system() {
        let client = Arc::new(FlakyClient::new(0));
        let capability = LlmCapability::new(client.clone(), "llama3.2", policy(1));

        let label = capability
            .classify("respond with rag or sql", "how many users?")
            .await
            .unwrap();
        assert_eq!(label, "echo: how many users?");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].system(), Some("respond with rag or sql"));
        assert_eq!(seen[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_generate_retries_transient_failures() {
        let client = Arc::new(FlakyClient::new(2));
        let capability = LlmCapability::new(client.clone(), "llama3.2", policy(3));

        let text = capability.generate(None, "hello").await.unwrap();
        assert_eq!(text, "echo: hello");
        assert_eq!(client.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_generate_surfaces_provider_error_when_exhausted() {
        let client = Arc::new(FlakyClient::new(5));
        let capability = LlmCapability::new(client, "llama3.2", policy(2));

        let err = capability.generate(None, "hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
    }
}
