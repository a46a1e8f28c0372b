//! Externally facing question-answering service.
//!
//! `QaService` owns the document store, the indexer, the knowledge base
//! manager and the workflow engine, and exposes ingestion, rebuilds,
//! `ask` and the document listings.

use crate::engine::WorkflowEngine;
use crate::executor::{QueryExecutor, SqliteExecutor, UnconfiguredExecutor};
use crate::prompts::PromptSet;
use crate::rag::RagPath;
use crate::router::Router;
use crate::sql::SqlPath;
use crate::state::Answer;
use askroute_core::config::RagSettings;
use askroute_core::{AppConfig, AppError, AppResult};
use askroute_knowledge::{
    create_embedder, Document, DocumentIndexer, DocumentStore, Embedder, IndexStore,
    KnowledgeBaseManager, Metadata, ProcessingStats, SourceType, SqliteDocumentStore,
    SqliteIndexStore,
};
use askroute_llm::{create_client, Classifier, Generator, LlmCapability, RetryPolicy};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything a `QaService` is assembled from.
pub struct Components {
    pub documents: Arc<dyn DocumentStore>,
    pub indexes: Arc<dyn IndexStore>,
    pub embedder: Arc<dyn Embedder>,
    pub classifier: Arc<dyn Classifier>,
    pub generator: Arc<dyn Generator>,
    pub executor: Arc<dyn QueryExecutor>,
    pub prompts: PromptSet,
    pub rag: RagSettings,
    pub query_timeout: Duration,
}

pub struct QaService {
    documents: Arc<dyn DocumentStore>,
    indexer: DocumentIndexer,
    knowledge: Arc<KnowledgeBaseManager>,
    engine: WorkflowEngine,
}

impl QaService {
    pub fn new(components: Components) -> Self {
        let Components {
            documents,
            indexes,
            embedder,
            classifier,
            generator,
            executor,
            prompts,
            rag,
            query_timeout,
        } = components;

        let indexer = DocumentIndexer::new(
            documents.clone(),
            indexes.clone(),
            embedder.clone(),
            rag.chunk_size,
            rag.chunk_overlap,
        );
        let knowledge = Arc::new(KnowledgeBaseManager::new(
            documents.clone(),
            indexes,
            embedder,
            rag.top_k,
        ));

        let engine = WorkflowEngine::new(
            Router::new(classifier, prompts.router),
            RagPath::new(generator.clone(), prompts.rag_answer),
            SqlPath::new(
                generator,
                executor,
                prompts.sql_write,
                prompts.sql_answer,
                query_timeout,
            ),
            knowledge.clone(),
        );

        Self {
            documents,
            indexer,
            knowledge,
            engine,
        }
    }

    /// Build the service from configuration: SQLite stores under the
    /// workspace state directory, the configured embedder and LLM provider,
    /// and the configured relational database if any.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        config.ensure_state_dir()?;

        let documents = Arc::new(SqliteDocumentStore::open(&config.documents_path())?);
        let indexes = Arc::new(SqliteIndexStore::new(config.indexes_dir()));
        let embedder = create_embedder(config)?;

        let provider_timeout = config
            .get_provider_config(&config.provider)
            .and_then(|pc| pc.timeout)
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.timeouts.provider());
        let client = create_client(
            &config.provider,
            config.provider_endpoint(&config.provider).as_deref(),
            provider_timeout,
        )?;
        let mut policy = RetryPolicy::from_settings(&config.retry, &config.timeouts);
        policy.timeout = provider_timeout;
        let llm = Arc::new(LlmCapability::new(client, config.model.clone(), policy));

        let executor: Arc<dyn QueryExecutor> = match &config.database {
            Some(path) => Arc::new(SqliteExecutor::new(path)?),
            None => Arc::new(UnconfiguredExecutor),
        };

        info!(
            "Service ready: provider={} model={} embedder={}",
            config.provider,
            config.model,
            embedder.model_name()
        );

        Ok(Self::new(Components {
            documents,
            indexes,
            embedder,
            classifier: llm.clone(),
            generator: llm,
            executor,
            prompts: PromptSet::load(&config.workspace)?,
            rag: config.rag.clone(),
            query_timeout: config.timeouts.query_execution(),
        }))
    }

    /// Ingest one document and, on success, rebuild the knowledge base so
    /// it is immediately answerable.
    pub async fn ingest_document(
        &self,
        bytes: &[u8],
        title: &str,
        source_type: SourceType,
        metadata: Metadata,
    ) -> AppResult<Document> {
        let document = self
            .indexer
            .ingest(bytes, title, source_type, metadata)
            .await?;

        if let Err(e) = self.rebuild_knowledge_base().await {
            warn!("Rebuild after ingesting {} failed: {}", document.id, e);
        }
        Ok(document)
    }

    /// Read and ingest a file; the title defaults to the file name.
    pub async fn ingest_file(
        &self,
        path: &Path,
        title: Option<&str>,
        metadata: Metadata,
    ) -> AppResult<Document> {
        let source_type = SourceType::from_path(path)?;
        let bytes = tokio::fs::read(path).await?;
        let title = match title {
            Some(title) => title.to_string(),
            None => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        self.ingest_document(&bytes, &title, source_type, metadata)
            .await
    }

    /// Rebuild the combined index. Returns whether it holds any chunks.
    pub async fn rebuild_knowledge_base(&self) -> AppResult<bool> {
        let knowledge = Arc::clone(&self.knowledge);
        let retriever = tokio::task::spawn_blocking(move || knowledge.rebuild())
            .await
            .map_err(|e| AppError::Storage(format!("Rebuild task failed: {}", e)))??;
        Ok(retriever.is_ready())
    }

    pub async fn ask(&self, question: &str) -> AppResult<Answer> {
        self.engine.ask(question).await
    }

    pub fn list_documents(&self, skip: usize, limit: usize) -> AppResult<Vec<Document>> {
        self.documents.list(skip, limit)
    }

    pub fn get_document(&self, document_id: &str) -> AppResult<Option<Document>> {
        self.documents.get(document_id)
    }

    pub fn processing_stats(&self) -> AppResult<ProcessingStats> {
        self.documents.processing_stats()
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBaseManager> {
        &self.knowledge
    }
}

/// Parse caller metadata given as a JSON object.
pub fn parse_metadata(raw: &str) -> AppResult<Metadata> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Validation(
            "Metadata must be a JSON object".to_string(),
        )),
        Err(e) => Err(AppError::Validation(format!("Invalid metadata JSON: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askroute_core::ErrorKind;

    #[test]
    fn test_parse_metadata_object() {
        let metadata = parse_metadata(r#"{"department": "sales", "year": 2020}"#).unwrap();
        assert_eq!(metadata["department"], "sales");
        assert_eq!(metadata["year"], 2020);
    }

    #[test]
    fn test_parse_metadata_rejects_non_objects() {
        for raw in ["[1, 2]", "\"text\"", "42", "{not json"] {
            let err = parse_metadata(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{}", raw);
        }
    }
}
