//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use askroute_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Both the system instruction and the user template are rendered with the
/// same variables. Rendering is strict: a variable the definition declares
/// but the caller did not supply, or a template reference to an unknown
/// variable, is an `AppError::Prompt`.
///
/// # Example
/// ```no_run
/// use askroute_prompt::{build_prompt, load_builtin};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = load_builtin("router.decide")?;
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "How many users signed up?".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    if let Some(missing) = definition
        .variables
        .iter()
        .find(|name| !variables.contains_key(*name))
    {
        return Err(AppError::Prompt(format!(
            "Prompt {} requires variable '{}'",
            definition.id, missing
        )));
    }

    let user = render_template(&definition.template, &variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|system| render_template(system, &variables))
        .transpose()?;

    Ok(BuiltPrompt::new(system, user, definition.id.clone(), variables))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output, no HTML escaping
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_builtin, SQL_WRITE};
    use crate::types::PromptOutputSpec;

    fn create_test_definition() -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            system: Some("Schema: {{schema}}".to_string()),
            variables: vec!["question".to_string(), "schema".to_string()],
            template: "Question: {{question}}".to_string(),
            output: PromptOutputSpec::default(),
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_simple_template() {
        let result = render_template(
            "Question: {{question}}",
            &vars(&[("question", "Hello, world!")]),
        );
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_values_are_not_html_escaped() {
        let result = render_template("{{q}}", &vars(&[("q", "a < b && c > 'd'")]));
        assert_eq!(result.unwrap(), "a < b && c > 'd'");
    }

    #[test]
    fn test_build_renders_system_and_user() {
        let def = create_test_definition();
        let built = build_prompt(
            &def,
            vars(&[("question", "Who?"), ("schema", "CREATE TABLE t (x)")]),
        )
        .unwrap();

        assert_eq!(built.user, "Question: Who?");
        assert_eq!(built.system.as_deref(), Some("Schema: CREATE TABLE t (x)"));
        assert_eq!(built.metadata.source_prompt_id, "test.prompt");
    }

    #[test]
    fn test_missing_declared_variable_fails() {
        let def = create_test_definition();
        let err = build_prompt(&def, vars(&[("question", "Who?")])).unwrap_err();
        assert!(err.to_string().contains("schema"));
    }

    #[test]
    fn test_render_template_missing_variable_is_strict() {
        let result = render_template("Question: {{missing}}", &HashMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_builtin_sql_write_embeds_schema() {
        let def = load_builtin(SQL_WRITE).unwrap();
        let built = build_prompt(
            &def,
            vars(&[
                ("question", "How many users?"),
                ("schema", "CREATE TABLE users (id INTEGER)"),
            ]),
        )
        .unwrap();

        assert!(built
            .system
            .unwrap()
            .contains("CREATE TABLE users (id INTEGER)"));
        assert!(built.user.contains("How many users?"));
    }
}
