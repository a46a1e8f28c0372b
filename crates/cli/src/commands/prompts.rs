//! Prompts command handler.

use super::print_json;
use askroute_core::{config::AppConfig, AppResult};
use askroute_prompt::{list_prompts, PromptSource};
use clap::Args;

/// List prompt definitions and whether the workspace overrides them
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let prompts = list_prompts(&config.workspace)?;

        if self.json {
            let items: Vec<serde_json::Value> = prompts
                .iter()
                .map(|(id, source)| serde_json::json!({ "id": id, "source": source_name(*source) }))
                .collect();
            return print_json(&serde_json::Value::Array(items));
        }

        for (id, source) in &prompts {
            println!("{:<16} {}", id, source_name(*source));
        }
        Ok(())
    }
}

fn source_name(source: PromptSource) -> &'static str {
    match source {
        PromptSource::Builtin => "builtin",
        PromptSource::Workspace => "workspace",
    }
}
