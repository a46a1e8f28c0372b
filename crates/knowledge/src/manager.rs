//! Knowledge Base Manager.
//!
//! Merges the persisted indexes of all processed documents into one combined
//! index and publishes it as an immutable `Retriever` snapshot. Readers clone
//! the current `Arc<Retriever>` and keep using it for the whole request;
//! a rebuild builds a new snapshot off to the side and swaps the reference.

use crate::documents::DocumentStore;
use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use crate::index_store::IndexStore;
use crate::types::SearchHit;
use askroute_core::{AppError, AppResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Read-only view over one combined index.
#[derive(Debug)]
pub struct Retriever {
    index: Option<Arc<VectorIndex>>,
    document_ids: Vec<String>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    generation: u64,
}

impl Retriever {
    fn unready(embedder: Arc<dyn Embedder>, top_k: usize, generation: u64) -> Self {
        Self {
            index: None,
            document_ids: Vec::new(),
            embedder,
            top_k,
            generation,
        }
    }

    /// Whether the snapshot holds at least one chunk.
    pub fn is_ready(&self) -> bool {
        self.index.as_ref().is_some_and(|index| !index.is_empty())
    }

    /// Monotonic id of the rebuild that produced this snapshot (0 = none yet).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Documents whose chunks are in this snapshot.
    pub fn document_ids(&self) -> &[String] {
        &self.document_ids
    }

    /// Number of chunks in this snapshot.
    pub fn len(&self) -> usize {
        self.index.as_ref().map(|index| index.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top-K chunks most similar to `question`, best first.
    pub async fn retrieve(&self, question: &str) -> AppResult<Vec<SearchHit>> {
        let index = match &self.index {
            Some(index) if !index.is_empty() => index,
            _ => {
                return Err(AppError::NotReady(
                    "Knowledge base is empty. Ingest and process documents first.".to_string(),
                ))
            }
        };

        let query = self.embedder.embed(question).await?;
        let hits = index.search(&query, self.top_k)?;

        debug!(
            "Retrieved {} chunks (requested top-{}) from generation {}",
            hits.len(),
            self.top_k,
            self.generation
        );
        Ok(hits)
    }
}

/// Builds combined retrieval snapshots from per-document indexes.
pub struct KnowledgeBaseManager {
    documents: Arc<dyn DocumentStore>,
    indexes: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    current: RwLock<Arc<Retriever>>,
    generation: AtomicU64,
}

impl KnowledgeBaseManager {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        indexes: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
    ) -> Self {
        let initial = Retriever::unready(embedder.clone(), top_k, 0);
        Self {
            documents,
            indexes,
            embedder,
            top_k,
            current: RwLock::new(Arc::new(initial)),
            generation: AtomicU64::new(0),
        }
    }

    /// The currently published snapshot.
    pub fn retriever(&self) -> Arc<Retriever> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&current)
    }

    /// Rebuild the combined index from every processed document.
    ///
    /// Unloadable indexes and indexes whose dimension differs from the
    /// embedder's are skipped with a warning. An embedder that does not know
    /// its dimension yet defers to the first loaded index. With nothing loaded the
    /// result is an unready snapshot. The new snapshot is published unless a
    /// rebuild that started later has already published its own.
    pub fn rebuild(&self) -> AppResult<Arc<Retriever>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let document_ids = self.documents.list_processed_documents()?;
        let expected = self.embedder.dimensions();

        let mut combined = VectorIndex::default();
        let mut loaded = Vec::with_capacity(document_ids.len());

        for document_id in document_ids {
            let index = match self.indexes.load(&document_id) {
                Ok(index) => index,
                Err(e) => {
                    warn!("Skipping document {}: failed to load index: {}", document_id, e);
                    continue;
                }
            };

            if expected != 0 && !index.is_empty() && index.dimensions() != expected {
                warn!(
                    "Skipping document {}: index has {} dimensions, embedder produces {}",
                    document_id,
                    index.dimensions(),
                    expected
                );
                continue;
            }

            if let Err(e) = combined.merge_from(&index) {
                warn!("Skipping document {}: {}", document_id, e);
                continue;
            }
            loaded.push(document_id);
        }

        let retriever = if combined.is_empty() {
            Arc::new(Retriever::unready(self.embedder.clone(), self.top_k, generation))
        } else {
            Arc::new(Retriever {
                index: Some(Arc::new(combined)),
                document_ids: loaded,
                embedder: self.embedder.clone(),
                top_k: self.top_k,
                generation,
            })
        };

        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            if current.generation < generation {
                *current = Arc::clone(&retriever);
            } else {
                debug!(
                    "Rebuild {} finished after newer snapshot {}; not installed",
                    generation, current.generation
                );
            }
        }

        info!(
            "Knowledge base rebuilt (generation {}): {} documents, {} chunks, ready={}",
            generation,
            retriever.document_ids.len(),
            retriever.len(),
            retriever.is_ready()
        );

        Ok(retriever)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::SqliteDocumentStore;
    use crate::embeddings::TrigramEmbedder;
    use crate::index_store::SqliteIndexStore;
    use askroute_core::ErrorKind;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> KnowledgeBaseManager {
        KnowledgeBaseManager::new(
            Arc::new(SqliteDocumentStore::in_memory().unwrap()),
            Arc::new(SqliteIndexStore::new(temp.path())),
            Arc::new(TrigramEmbedder::new(64)),
            3,
        )
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_unready() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        let retriever = manager.retriever();
        assert!(!retriever.is_ready());
        assert_eq!(retriever.generation(), 0);

        let err = retriever.retrieve("anything").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
    }

    #[test]
    fn test_rebuild_without_documents_is_unready() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        let retriever = manager.rebuild().unwrap();
        assert!(!retriever.is_ready());
        assert_eq!(retriever.generation(), 1);
        assert_eq!(manager.retriever().generation(), 1);
    }

    #[test]
    fn test_generations_increase() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        manager.rebuild().unwrap();
        manager.rebuild().unwrap();
        assert_eq!(manager.retriever().generation(), 2);
    }
}
