//! Prompt loader for YAML prompt definitions.
//!
//! Built-in definitions ship inside the binary. A workspace can override any
//! of them by placing `<id>.yml` under `.askroute/prompts/`.

use crate::types::{PromptDefinition, PromptSource};
use askroute_core::config::STATE_DIR;
use askroute_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Prompt used by the router to pick a path.
pub const ROUTER_DECIDE: &str = "router.decide";
/// Prompt used to answer from retrieved passages.
pub const RAG_ANSWER: &str = "rag.answer";
/// Prompt used to write a structured query.
pub const SQL_WRITE: &str = "sql.write";
/// Prompt used to answer from query results.
pub const SQL_ANSWER: &str = "sql.answer";

const BUILTIN_PROMPTS: [(&str, &str); 4] = [
    (ROUTER_DECIDE, include_str!("../prompts/router.decide.yml")),
    (RAG_ANSWER, include_str!("../prompts/rag.answer.yml")),
    (SQL_WRITE, include_str!("../prompts/sql.write.yml")),
    (SQL_ANSWER, include_str!("../prompts/sql.answer.yml")),
];

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(STATE_DIR).join("prompts")
}

/// Load a prompt definition by ID.
///
/// Looks for `.askroute/prompts/<id>.yml` in the workspace first and falls
/// back to the built-in definition with the same ID.
///
/// # Example
/// ```no_run
/// use askroute_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (prompt, _source) = load_prompt(Path::new("."), "router.decide")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(
    workspace_path: &Path,
    prompt_id: &str,
) -> AppResult<(PromptDefinition, PromptSource)> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if prompt_file.exists() {
        tracing::debug!("Loading prompt from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        let definition = parse_prompt(&contents, &prompt_file.display().to_string())?;
        if definition.id != prompt_id {
            return Err(AppError::Prompt(format!(
                "Prompt file {:?} declares id '{}', expected '{}'",
                prompt_file, definition.id, prompt_id
            )));
        }

        tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);
        return Ok((definition, PromptSource::Workspace));
    }

    let builtin = load_builtin(prompt_id)?;
    Ok((builtin, PromptSource::Builtin))
}

/// Load a built-in prompt definition.
pub fn load_builtin(prompt_id: &str) -> AppResult<PromptDefinition> {
    let contents = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(_, contents)| *contents)
        .ok_or_else(|| AppError::Prompt(format!("Prompt not found: {}", prompt_id)))?;

    parse_prompt(contents, prompt_id)
}

/// List all available prompt IDs with their source, sorted by ID.
///
/// Workspace files shadow built-ins of the same ID.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<(String, PromptSource)>> {
    let mut prompts: Vec<(String, PromptSource)> = BUILTIN_PROMPTS
        .iter()
        .map(|(id, _)| (id.to_string(), PromptSource::Builtin))
        .collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    match prompts.iter_mut().find(|(id, _)| id == stem) {
                        Some(existing) => existing.1 = PromptSource::Workspace,
                        None => prompts.push((stem.to_string(), PromptSource::Workspace)),
                    }
                }
            }
        }
    }

    prompts.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(prompts)
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e)))?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, body: &str) {
        let prompts_dir = prompts_dir(dir);
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), body).unwrap();
    }

    #[test]
    fn test_all_builtins_parse() {
        for (id, _) in BUILTIN_PROMPTS {
            let def = load_builtin(id).unwrap();
            assert_eq!(def.id, id);
            assert!(def.system.is_some());
        }
    }

    #[test]
    fn test_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let (def, source) = load_prompt(temp_dir.path(), ROUTER_DECIDE).unwrap();
        assert_eq!(def.id, ROUTER_DECIDE);
        assert_eq!(source, PromptSource::Builtin);
        assert!(def.template.contains("'rag' or 'sql'"));
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            RAG_ANSWER,
            r#"
id: rag.answer
title: "Custom"
apiVersion: "1.0"
template: "Q: {{question}} C: {{context}}"
"#,
        );

        let (def, source) = load_prompt(temp_dir.path(), RAG_ANSWER).unwrap();
        assert_eq!(source, PromptSource::Workspace);
        assert_eq!(def.title, "Custom");
    }

    #[test]
    fn test_override_with_wrong_id_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            SQL_WRITE,
            r#"
id: something.else
title: "Wrong"
apiVersion: "1.0"
template: "x"
"#,
        );

        assert!(load_prompt(temp_dir.path(), SQL_WRITE).is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), SQL_ANSWER, "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), SQL_ANSWER).is_err());
    }

    #[test]
    fn test_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_list_prompts_marks_overrides() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            RAG_ANSWER,
            "id: rag.answer\ntitle: t\napiVersion: \"1.0\"\ntemplate: x\n",
        );
        write_prompt(
            temp_dir.path(),
            "extra.note",
            "id: extra.note\ntitle: t\napiVersion: \"1.0\"\ntemplate: x\n",
        );

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts.len(), 5);
        assert!(prompts.contains(&(RAG_ANSWER.to_string(), PromptSource::Workspace)));
        assert!(prompts.contains(&(ROUTER_DECIDE.to_string(), PromptSource::Builtin)));
        assert!(prompts.contains(&("extra.note".to_string(), PromptSource::Workspace)));
    }
}
