//! Rebuild command handler.

use super::print_json;
use askroute_core::{config::AppConfig, AppResult};
use askroute_workflow::QaService;
use clap::Args;

/// Rebuild the combined knowledge base from all processed documents
#[derive(Args, Debug)]
pub struct RebuildCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RebuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing rebuild command");

        let service = QaService::from_config(config)?;
        let ready = service.rebuild_knowledge_base().await?;
        let snapshot = service.knowledge().retriever();

        if self.json {
            print_json(&serde_json::json!({
                "ready": ready,
                "documents": snapshot.document_ids().len(),
                "chunks": snapshot.len(),
            }))?;
        } else if ready {
            println!(
                "Knowledge base ready: {} documents, {} chunks",
                snapshot.document_ids().len(),
                snapshot.len()
            );
        } else {
            println!("Knowledge base is empty. Ingest documents with `askroute ingest <path>`.");
        }

        Ok(())
    }
}
