//! Configuration management for askroute.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.askroute/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.askroute/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".askroute";

/// Providers that can serve completions (classification and generation).
const KNOWN_PROVIDERS: [&str; 1] = ["ollama"];

/// Providers that can serve embeddings.
const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .askroute/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider used by the router and generators
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// Embedding provider ("trigram" or "ollama")
    pub embedding_provider: String,

    /// Relational store queried by the structured-query path
    pub database: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Chunking and retrieval parameters
    pub rag: RagSettings,

    /// Per-call time limits
    pub timeouts: TimeoutSettings,

    /// Retry budget for provider calls
    pub retry: RetrySettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "activeEmbeddingProvider")]
    pub active_embedding_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub model: String,
    #[serde(rename = "embeddingModel")]
    pub embedding_model: Option<String>,
    /// Request timeout in seconds
    pub timeout: Option<u64>,
}

/// Chunking and retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RagSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Dimension of the offline embedder
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    3
}

fn default_embedding_dimensions() -> usize {
    384
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            embedding_dimensions: default_embedding_dimensions(),
        }
    }
}

/// Time limits applied to potentially blocking remote operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSettings {
    /// Limit for each classification, generation or embedding attempt
    #[serde(default = "default_provider_secs")]
    pub provider_secs: u64,

    /// Limit for executing one generated query
    #[serde(default = "default_query_execution_secs")]
    pub query_execution_secs: u64,
}

fn default_provider_secs() -> u64 {
    30
}

fn default_query_execution_secs() -> u64 {
    15
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            provider_secs: default_provider_secs(),
            query_execution_secs: default_query_execution_secs(),
        }
    }
}

impl TimeoutSettings {
    pub fn provider(&self) -> Duration {
        Duration::from_secs(self.provider_secs)
    }

    pub fn query_execution(&self) -> Duration {
        Duration::from_secs(self.query_execution_secs)
    }
}

/// Bounded retry budget for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    rag: Option<RagSettings>,
    timeouts: Option<TimeoutSettings>,
    retry: Option<RetrySettings>,
    database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatabaseConfig {
    path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            embedding_provider: "trigram".to_string(),
            database: None,
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
            llm: None,
            rag: RagSettings::default(),
            timeouts: TimeoutSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default workspace and environment.
    ///
    /// Environment variables:
    /// - `ASKROUTE_WORKSPACE`: Override workspace path
    /// - `ASKROUTE_CONFIG`: Path to config file
    /// - `ASKROUTE_PROVIDER`: Completion provider
    /// - `ASKROUTE_MODEL`: Model identifier
    /// - `ASKROUTE_DATABASE`: Relational store for structured queries
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use askroute_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration, letting explicit paths win over the environment
    /// when locating the workspace and the YAML file.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("ASKROUTE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        if let Ok(config_file) = std::env::var("ASKROUTE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }
        if config_file.is_some() {
            config.config_file = config_file;
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.state_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ASKROUTE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("ASKROUTE_MODEL") {
            config.model = model;
        }

        if let Ok(database) = std::env::var("ASKROUTE_DATABASE") {
            config.database = Some(PathBuf::from(database));
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_json = format.eq_ignore_ascii_case("json");
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            result.embedding_provider = llm.active_embedding_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model.clone();
            }

            result.llm = Some(llm);
        }

        if let Some(rag) = config_file.rag {
            result.rag = rag;
        }
        if let Some(timeouts) = config_file.timeouts {
            result.timeouts = timeouts;
        }
        if let Some(retry) = config_file.retry {
            result.retry = retry;
        }
        if let Some(database) = config_file.database {
            result.database = Some(PathBuf::from(database.path));
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        database: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(database) = database {
            self.database = Some(database);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .askroute directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .askroute directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// SQLite file holding Document records.
    pub fn documents_path(&self) -> PathBuf {
        self.state_dir().join("documents.sqlite")
    }

    /// Directory holding one persisted index per processed document.
    pub fn indexes_dir(&self) -> PathBuf {
        self.state_dir().join("indexes")
    }

    /// Get the configuration of a named provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint configured for a provider, if any.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint.clone())
    }

    /// Embedding model identifier recorded on each Document.
    pub fn embedding_model(&self) -> String {
        match self.embedding_provider.as_str() {
            "ollama" => self
                .get_provider_config("ollama")
                .and_then(|pc| pc.embedding_model.clone())
                .unwrap_or_else(|| "nomic-embed-text".to_string()),
            _ => "trigram-v1".to_string(),
        }
    }

    /// Validate configuration before any component is built.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding_provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.rag.chunk_size == 0 || self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }

        if self.rag.top_k == 0 {
            return Err(AppError::Config("topK must be at least 1".to_string()));
        }

        if self.rag.embedding_dimensions == 0 {
            return Err(AppError::Config(
                "embeddingDimensions must be at least 1".to_string(),
            ));
        }

        if self.timeouts.provider_secs == 0 || self.timeouts.query_execution_secs == 0 {
            return Err(AppError::Config("Timeouts must be non-zero".to_string()));
        }

        if self.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "retry.maxAttempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
