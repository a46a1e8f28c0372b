//! Shared on-disk knowledge base for cross-module tests.

use crate::documents::{DocumentStore, SqliteDocumentStore};
use crate::embeddings::{Embedder, TrigramEmbedder};
use crate::index_store::{IndexStore, SqliteIndexStore};
use crate::ingest::DocumentIndexer;
use crate::manager::KnowledgeBaseManager;
use crate::types::{Document, Metadata, SourceType};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Fixture {
    pub _temp: TempDir,
    pub documents: Arc<SqliteDocumentStore>,
    pub indexes: Arc<SqliteIndexStore>,
    pub indexer: DocumentIndexer,
    pub manager: Arc<KnowledgeBaseManager>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_chunking(1000, 200)
    }

    pub fn with_chunking(chunk_size: usize, chunk_overlap: usize) -> Self {
        let temp = TempDir::new().unwrap();
        let documents =
            Arc::new(SqliteDocumentStore::open(&temp.path().join("documents.sqlite")).unwrap());
        let indexes = Arc::new(SqliteIndexStore::new(temp.path().join("indexes")));
        let embedder: Arc<dyn Embedder> = Arc::new(TrigramEmbedder::new(256));

        let indexer = DocumentIndexer::new(
            documents.clone(),
            indexes.clone(),
            embedder.clone(),
            chunk_size,
            chunk_overlap,
        );
        let manager = Arc::new(KnowledgeBaseManager::new(
            documents.clone() as Arc<dyn DocumentStore>,
            indexes.clone() as Arc<dyn IndexStore>,
            embedder,
            3,
        ));

        Self {
            _temp: temp,
            documents,
            indexes,
            indexer,
            manager,
        }
    }

    pub async fn ingest(&self, title: &str, text: &str) -> Document {
        self.indexer
            .ingest(text.as_bytes(), title, SourceType::Text, Metadata::new())
            .await
            .unwrap()
    }
}
