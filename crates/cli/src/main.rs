//! askroute CLI
//!
//! Main entry point for the askroute command-line tool.
//! Ingests documents and answers questions from them or from a database.

mod commands;

use anyhow::Context;
use askroute_core::{config::AppConfig, logging};
use clap::{Parser, Subcommand};
use commands::{AskCommand, DocumentsCommand, IngestCommand, PromptsCommand, RebuildCommand};
use std::path::PathBuf;

/// askroute - answer questions from your documents or your database
#[derive(Parser, Debug)]
#[command(name = "askroute")]
#[command(about = "Answer questions from your documents or your database", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ASKROUTE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ASKROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama)
    #[arg(short, long, global = true, env = "ASKROUTE_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "ASKROUTE_MODEL")]
    model: Option<String>,

    /// SQLite database queried for structured questions
    #[arg(short, long, global = true, env = "ASKROUTE_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a document into the knowledge base
    Ingest(IngestCommand),

    /// Rebuild the knowledge base from processed documents
    Rebuild(RebuildCommand),

    /// Ask a question
    Ask(AskCommand),

    /// List documents and processing statistics
    Documents(DocumentsCommand),

    /// List prompt definitions and workspace overrides
    Prompts(PromptsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())
        .context("Failed to load configuration")?;

    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.database,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)
        .context("Failed to initialize logging")?;

    tracing::info!("askroute starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Rebuild(_) => "rebuild",
        Commands::Ask(_) => "ask",
        Commands::Documents(_) => "documents",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Rebuild(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Documents(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!(kind = e.kind().as_str(), "Command failed: {}", e),
    }

    result.with_context(|| format!("{} failed", command_name))
}
