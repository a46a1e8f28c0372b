//! Command handlers for the askroute CLI.

pub mod ask;
pub mod documents;
pub mod ingest;
pub mod prompts;
pub mod rebuild;

pub use ask::AskCommand;
pub use documents::DocumentsCommand;
pub use ingest::IngestCommand;
pub use prompts::PromptsCommand;
pub use rebuild::RebuildCommand;

use askroute_core::{AppError, AppResult};

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json(value: &serde_json::Value) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
