//! Retrieval-augmented answering.

use crate::prompts::render;
use askroute_core::AppResult;
use askroute_knowledge::Retriever;
use askroute_llm::Generator;
use askroute_prompt::PromptDefinition;
use std::sync::Arc;
use tracing::debug;

/// Answer plus the grounding context it was generated from.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub context: Vec<String>,
}

pub struct RagPath {
    generator: Arc<dyn Generator>,
    prompt: PromptDefinition,
}

impl RagPath {
    pub fn new(generator: Arc<dyn Generator>, prompt: PromptDefinition) -> Self {
        Self { generator, prompt }
    }

    /// Answer `question` from the top-K chunks of `retriever`.
    ///
    /// The generator's output is returned verbatim.
    pub async fn answer_rag(&self, question: &str, retriever: &Retriever) -> AppResult<RagAnswer> {
        let hits = retriever.retrieve(question).await?;
        let context: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();
        debug!("Grounding context: {} chunks", context.len());

        let joined = context.join("\n\n");
        let built = render(&self.prompt, &[("question", question), ("context", &joined)])?;
        let answer = self
            .generator
            .generate(built.system.as_deref(), &built.user)
            .await?;

        Ok(RagAnswer { answer, context })
    }
}
