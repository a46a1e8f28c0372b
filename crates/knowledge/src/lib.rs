//! Knowledge base management for askroute.
//!
//! Documents are ingested one at a time into per-document indexes persisted
//! under `.askroute/indexes/`. The `KnowledgeBaseManager` merges the indexes
//! of all processed documents into an immutable, atomically published
//! `Retriever` snapshot.

pub mod chunker;
pub mod documents;
pub mod embeddings;
pub mod extract;
pub mod index;
pub mod index_store;
pub mod ingest;
pub mod manager;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use documents::{DocumentStore, SqliteDocumentStore};
pub use embeddings::{create_embedder, Embedder, OllamaEmbedder, TrigramEmbedder};
pub use index::{IndexEntry, VectorIndex};
pub use index_store::{IndexStore, SqliteIndexStore};
pub use ingest::DocumentIndexer;
pub use manager::{KnowledgeBaseManager, Retriever};
pub use types::{
    Chunk, Document, DocumentStatus, Metadata, NewDocument, ProcessingStats, SearchHit, SourceType,
};
