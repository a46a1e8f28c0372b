//! Documents command handler.

use super::print_json;
use askroute_core::{config::AppConfig, AppResult};
use askroute_workflow::QaService;
use clap::{Args, Subcommand};

/// Inspect ingested documents
#[derive(Args, Debug)]
pub struct DocumentsCommand {
    #[command(subcommand)]
    pub action: DocumentsAction,
}

#[derive(Subcommand, Debug)]
pub enum DocumentsAction {
    /// List documents, newest first
    List(DocumentsListCommand),
    /// Show processing statistics
    Stats(DocumentsStatsCommand),
}

impl DocumentsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            DocumentsAction::List(cmd) => cmd.execute(config),
            DocumentsAction::Stats(cmd) => cmd.execute(config),
        }
    }
}

#[derive(Args, Debug)]
pub struct DocumentsListCommand {
    /// Number of documents to skip
    #[arg(long, default_value = "0")]
    pub skip: usize,

    /// Maximum number of documents to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocumentsListCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Listing documents (skip={}, limit={})", self.skip, self.limit);

        let service = QaService::from_config(config)?;
        let documents = service.list_documents(self.skip, self.limit)?;

        if self.json {
            let items: Vec<serde_json::Value> = documents
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "id": d.id,
                        "title": d.title,
                        "status": d.status,
                        "sourceType": d.source_type,
                        "metadata": d.metadata,
                        "error": d.error,
                        "createdAt": d.created_at,
                        "processedAt": d.processed_at,
                    })
                })
                .collect();
            print_json(&serde_json::Value::Array(items))?;
            return Ok(());
        }

        if documents.is_empty() {
            println!("No documents.");
            return Ok(());
        }

        for d in &documents {
            println!(
                "{}  {:<10}  {:<8}  {}",
                d.id,
                d.status.as_str(),
                d.source_type.as_str(),
                d.title
            );
            if let Some(error) = &d.error {
                println!("    error: {}", error);
            }
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DocumentsStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocumentsStatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Computing processing statistics");

        let service = QaService::from_config(config)?;
        let stats = service.processing_stats()?;

        if self.json {
            print_json(&serde_json::json!({
                "total": stats.total,
                "byStatus": stats.by_status,
                "avgProcessingSecs": stats.avg_processing_secs,
            }))?;
            return Ok(());
        }

        println!("Total documents: {}", stats.total);
        for (status, count) in &stats.by_status {
            match stats.avg_processing_secs.get(status) {
                Some(avg) => println!("  {:<10} {:>6}  (avg {:.2}s)", status, count, avg),
                None => println!("  {:<10} {:>6}", status, count),
            }
        }

        Ok(())
    }
}
