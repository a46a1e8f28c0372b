//! Per-document indexing.
//!
//! Ingestion is two-phase: the record is created `pending`, moved to
//! `processing`, and only flipped to `processed` after its index has been
//! persisted. Any failure after the record exists flips it to `failed`, and
//! a partially written index is removed.

use crate::chunker::chunk_text;
use crate::documents::DocumentStore;
use crate::embeddings::Embedder;
use crate::extract::extract_text;
use crate::index::VectorIndex;
use crate::index_store::IndexStore;
use crate::types::{Document, DocumentStatus, Metadata, NewDocument, SourceType};
use askroute_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Turns one uploaded document into a persisted per-document index.
pub struct DocumentIndexer {
    documents: Arc<dyn DocumentStore>,
    indexes: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentIndexer {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        indexes: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            documents,
            indexes,
            embedder,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Ingest a document and return its final record.
    ///
    /// On failure the record (already created) is left `failed` and the
    /// error is returned with its original kind.
    #[instrument(
        skip(self, bytes, metadata),
        fields(bytes = bytes.len(), source_type = %source_type)
    )]
    pub async fn ingest(
        &self,
        bytes: &[u8],
        title: &str,
        source_type: SourceType,
        metadata: Metadata,
    ) -> AppResult<Document> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Document title cannot be empty".to_string()));
        }

        let document = self.documents.create(NewDocument {
            title: title.to_string(),
            metadata,
            source_type,
            embedding_model: self.embedder.model_name().to_string(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            content_hash: Some(content_hash(bytes)),
        })?;

        match self.process(&document, bytes).await {
            Ok(processed) => {
                info!(
                    "Processed document {} ({}): {} chunks",
                    processed.id,
                    processed.title,
                    processed
                        .metadata
                        .get("num_chunks")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0)
                );
                Ok(processed)
            }
            Err(e) => {
                error!("Failed to process document {}: {}", document.id, e);

                if let Err(cleanup) = self.indexes.delete(&document.id) {
                    error!("Failed to remove index for {}: {}", document.id, cleanup);
                }
                if let Err(mark) = self.documents.mark_failed(&document.id, &e.to_string()) {
                    error!("Failed to mark document {} as failed: {}", document.id, mark);
                }
                Err(e)
            }
        }
    }

    async fn process(&self, document: &Document, bytes: &[u8]) -> AppResult<Document> {
        self.documents
            .set_status(&document.id, DocumentStatus::Processing)?;

        let extracted = extract_text(bytes, document.source_type)?;
        let chunks = chunk_text(
            &document.id,
            &extracted.text,
            self.chunk_size,
            self.chunk_overlap,
        )?;
        if chunks.is_empty() {
            return Err(AppError::Validation(format!(
                "Document {} produced no chunks",
                document.id
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let index = VectorIndex::build(&chunks, embeddings)?;

        // The record flips to processed only once the index is durable
        self.indexes.save(&document.id, &index)?;

        let mut metadata = document.metadata.clone();
        metadata.insert("num_pages".to_string(), extracted.num_pages.into());
        metadata.insert("num_chunks".to_string(), chunks.len().into());
        metadata.insert("chunk_size".to_string(), self.chunk_size.into());
        metadata.insert("chunk_overlap".to_string(), self.chunk_overlap.into());

        self.documents
            .mark_processed(&document.id, &extracted.text, &metadata)
    }
}

/// Hex-encoded SHA-256 of the uploaded bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::SqliteDocumentStore;
    use crate::embeddings::TrigramEmbedder;
    use crate::index_store::SqliteIndexStore;
    use askroute_core::ErrorKind;
    use tempfile::TempDir;

    /// Index store whose writes always fail.
    struct ReadOnlyIndexStore;

    impl IndexStore for ReadOnlyIndexStore {
        fn save(&self, _: &str, _: &VectorIndex) -> AppResult<()> {
            Err(AppError::Storage("disk full".to_string()))
        }
        fn load(&self, id: &str) -> AppResult<VectorIndex> {
            Err(AppError::Storage(format!("no index for {}", id)))
        }
        fn delete(&self, _: &str) -> AppResult<()> {
            Ok(())
        }
        fn exists(&self, _: &str) -> bool {
            false
        }
    }

    fn indexer(indexes: Arc<dyn IndexStore>) -> (DocumentIndexer, Arc<SqliteDocumentStore>) {
        let documents = Arc::new(SqliteDocumentStore::in_memory().unwrap());
        let indexer = DocumentIndexer::new(
            documents.clone(),
            indexes,
            Arc::new(TrigramEmbedder::new(128)),
            1000,
            200,
        );
        (indexer, documents)
    }

    #[tokio::test]
    async fn test_ingest_text_document() {
        let temp = TempDir::new().unwrap();
        let indexes = Arc::new(SqliteIndexStore::new(temp.path()));
        let (indexer, documents) = indexer(indexes.clone());

        let mut metadata = Metadata::new();
        metadata.insert("brand".to_string(), "glutt".into());

        let doc = indexer
            .ingest(b"Glutt.ai was founded in 2020.", "About", SourceType::Text, metadata)
            .await
            .unwrap();

        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.content, "Glutt.ai was founded in 2020.");
        assert_eq!(doc.embedding_model, "trigram-v1");
        assert_eq!(doc.metadata["brand"], "glutt");
        assert_eq!(doc.metadata["num_chunks"], 1);
        assert_eq!(doc.metadata["num_pages"], 1);
        assert_eq!(doc.metadata["chunk_size"], 1000);
        assert_eq!(doc.metadata["chunk_overlap"], 200);
        assert_eq!(
            doc.content_hash.as_deref(),
            Some(content_hash(b"Glutt.ai was founded in 2020.").as_str())
        );

        assert!(indexes.exists(&doc.id));
        assert_eq!(indexes.load(&doc.id).unwrap().len(), 1);
        assert_eq!(documents.list_processed_documents().unwrap(), vec![doc.id]);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_marks_failed() {
        let temp = TempDir::new().unwrap();
        let indexes = Arc::new(SqliteIndexStore::new(temp.path()));
        let (indexer, documents) = indexer(indexes);

        let err = indexer
            .ingest(b"%PDF-1.4 garbage", "Broken", SourceType::Pdf, Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let all = documents.list(0, 10).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, DocumentStatus::Failed);
        assert!(all[0].error.is_some());
        assert!(documents.list_processed_documents().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_never_marks_processed() {
        let (indexer, documents) = indexer(Arc::new(ReadOnlyIndexStore));

        let err = indexer
            .ingest(b"Some content here.", "Doc", SourceType::Text, Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);

        let all = documents.list(0, 10).unwrap();
        assert_eq!(all[0].status, DocumentStatus::Failed);
        assert_eq!(all[0].error.as_deref(), Some("Storage error: disk full"));
    }

    #[tokio::test]
    async fn test_empty_title_rejected_before_record() {
        let (indexer, documents) = indexer(Arc::new(ReadOnlyIndexStore));
        let err = indexer
            .ingest(b"text", "  ", SourceType::Text, Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(documents.list(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
