//! Routes a question to the documents or to the database.

use crate::prompts::render;
use crate::state::Decision;
use askroute_core::{AppError, AppResult};
use askroute_llm::Classifier;
use askroute_prompt::PromptDefinition;
use std::sync::Arc;
use tracing::debug;

pub struct Router {
    classifier: Arc<dyn Classifier>,
    prompt: PromptDefinition,
}

impl Router {
    pub fn new(classifier: Arc<dyn Classifier>, prompt: PromptDefinition) -> Self {
        Self { classifier, prompt }
    }

    pub async fn decide(&self, question: &str) -> AppResult<Decision> {
        let built = render(&self.prompt, &[("question", question)])?;
        let instruction = built.system.as_deref().unwrap_or_default();

        let raw = self.classifier.classify(instruction, &built.user).await?;
        debug!("Router label: {:?}", raw);

        parse_decision(&raw)
    }
}

/// Map a classifier label onto a decision.
///
/// The label is trimmed and case-folded; anything other than `rag` or `sql`
/// is rejected.
pub fn parse_decision(raw: &str) -> AppResult<Decision> {
    match raw.trim().to_lowercase().as_str() {
        "rag" => Ok(Decision::Rag),
        "sql" => Ok(Decision::Sql),
        _ => Err(AppError::Validation(format!(
            "Invalid routing decision: {:?}",
            raw
        ))),
    }
}
