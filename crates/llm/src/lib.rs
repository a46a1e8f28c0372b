//! LLM integration crate for askroute.
//!
//! Provides a provider-agnostic completion client plus the two narrow
//! capabilities the workflow depends on: `Generator` and `Classifier`.
//! Every remote call runs under a `RetryPolicy` (per-attempt timeout and
//! bounded exponential-backoff retry).
//!
//! # Example
//! ```no_run
//! use askroute_llm::{create_client, Generator, LlmCapability, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> askroute_core::AppResult<()> {
//! let client = create_client("ollama", None, Duration::from_secs(30))?;
//! let generator = LlmCapability::new(client, "llama3.2", RetryPolicy::default());
//! let text = generator.generate(None, "Hello, world!").await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod client;
pub mod factory;
pub mod providers;
pub mod retry;

pub use capability::{Classifier, Generator, LlmCapability};
pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, LlmUsage, Role};
pub use factory::create_client;
pub use providers::OllamaClient;
pub use retry::RetryPolicy;
