//! The four prompt definitions used by the workflow.

use askroute_core::AppResult;
use askroute_prompt::{
    build_prompt, load_builtin, load_prompt, BuiltPrompt, PromptDefinition, RAG_ANSWER,
    ROUTER_DECIDE, SQL_ANSWER, SQL_WRITE,
};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PromptSet {
    pub router: PromptDefinition,
    pub rag_answer: PromptDefinition,
    pub sql_write: PromptDefinition,
    pub sql_answer: PromptDefinition,
}

impl PromptSet {
    /// Load prompts, preferring workspace overrides over built-ins.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        Ok(Self {
            router: load_prompt(workspace, ROUTER_DECIDE)?.0,
            rag_answer: load_prompt(workspace, RAG_ANSWER)?.0,
            sql_write: load_prompt(workspace, SQL_WRITE)?.0,
            sql_answer: load_prompt(workspace, SQL_ANSWER)?.0,
        })
    }

    pub fn builtin() -> AppResult<Self> {
        Ok(Self {
            router: load_builtin(ROUTER_DECIDE)?,
            rag_answer: load_builtin(RAG_ANSWER)?,
            sql_write: load_builtin(SQL_WRITE)?,
            sql_answer: load_builtin(SQL_ANSWER)?,
        })
    }
}

/// Render `definition` with `(name, value)` pairs.
pub(crate) fn render(
    definition: &PromptDefinition,
    vars: &[(&str, &str)],
) -> AppResult<BuiltPrompt> {
    let variables: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    build_prompt(definition, variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_without_overrides_matches_builtin() {
        let temp = TempDir::new().unwrap();
        let loaded = PromptSet::load(temp.path()).unwrap();
        let builtin = PromptSet::builtin().unwrap();
        assert_eq!(loaded.router.template, builtin.router.template);
        assert_eq!(loaded.sql_answer.id, SQL_ANSWER);
    }

    #[test]
    fn test_render_rag_prompt() {
        let prompts = PromptSet::builtin().unwrap();
        let built = render(
            &prompts.rag_answer,
            &[("question", "When?"), ("context", "In 2020.")],
        )
        .unwrap();
        assert!(built.user.contains("When?"));
        assert!(built.user.contains("In 2020."));
    }
}
