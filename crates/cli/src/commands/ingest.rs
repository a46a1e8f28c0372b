//! Ingest command handler.

use super::print_json;
use askroute_core::{config::AppConfig, AppResult};
use askroute_knowledge::Metadata;
use askroute_workflow::{parse_metadata, QaService};
use clap::Args;
use std::path::PathBuf;

/// Ingest a document (.pdf, .txt, .md) into the knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Path of the document to ingest
    pub path: PathBuf,

    /// Document title (defaults to the file name)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Extra metadata as a JSON object, e.g. '{"team": "sales"}'
    #[arg(long)]
    pub metadata: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {:?}", self.path);

        let metadata = match &self.metadata {
            Some(raw) => parse_metadata(raw)?,
            None => Metadata::new(),
        };

        let service = QaService::from_config(config)?;
        let document = service
            .ingest_file(&self.path, self.title.as_deref(), metadata)
            .await?;

        if self.json {
            print_json(&serde_json::json!({
                "id": document.id,
                "title": document.title,
                "status": document.status,
                "sourceType": document.source_type,
                "metadata": document.metadata,
                "contentHash": document.content_hash,
            }))?;
        } else {
            println!(
                "Ingested '{}' as {} ({} chunks)",
                document.title,
                document.id,
                document
                    .metadata
                    .get("num_chunks")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0)
            );
        }

        Ok(())
    }
}
