//! In-memory similarity-search index over embedded chunks.
//!
//! A `VectorIndex` is the unit that gets persisted per document and the
//! combined structure the retriever searches. Indexes are plain values:
//! merging produces a new index and never mutates a shared one.

use crate::types::{Chunk, SearchHit};
use askroute_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// One embedded chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub document_id: String,
    pub position: u32,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Flat nearest-neighbour index with a fixed embedding dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimensions` components.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
        }
    }

    /// Build an index from chunks and their embeddings, pairwise.
    pub fn build(chunks: &[Chunk], embeddings: Vec<Vec<f32>>) -> AppResult<Self> {
        if chunks.len() != embeddings.len() {
            return Err(AppError::Provider(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        let mut index = Self::new(dimensions);
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            index.insert(IndexEntry {
                document_id: chunk.document_id.clone(),
                position: chunk.position,
                text: chunk.text.clone(),
                embedding,
            })?;
        }

        Ok(index)
    }

    /// Rebuild an index from persisted entries.
    pub fn from_entries(dimensions: usize, entries: Vec<IndexEntry>) -> AppResult<Self> {
        let mut index = Self::new(dimensions);
        for entry in entries {
            index.insert(entry)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, entry: IndexEntry) -> AppResult<()> {
        if entry.embedding.len() != self.dimensions {
            return Err(AppError::Storage(format!(
                "Embedding has {} dimensions, index expects {}",
                entry.embedding.len(),
                self.dimensions
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Merge two indexes into a new one holding the entries of both.
    ///
    /// Fails with `AppError::Storage` when the embedding dimensions differ.
    pub fn merge(a: &VectorIndex, b: &VectorIndex) -> AppResult<VectorIndex> {
        let mut merged = a.clone();
        merged.merge_from(b)?;
        Ok(merged)
    }

    /// Append every entry of `other` to this index.
    ///
    /// An empty index adopts the dimension of the first non-empty one merged
    /// into it. On a dimension mismatch this index is left unchanged.
    pub fn merge_from(&mut self, other: &VectorIndex) -> AppResult<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            self.dimensions = other.dimensions;
        } else if self.dimensions != other.dimensions {
            return Err(AppError::Storage(format!(
                "Cannot merge index with {} dimensions into index with {}",
                other.dimensions, self.dimensions
            )));
        }

        self.entries.extend(other.entries.iter().cloned());
        Ok(())
    }

    /// Return the `top_k` entries most similar to `query`, best first.
    ///
    /// Ties keep insertion order, so results are deterministic.
    pub fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(AppError::Provider(format!(
                "Query embedding has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let entry = &self.entries[i];
                SearchHit {
                    document_id: entry.document_id.clone(),
                    position: entry.position,
                    text: entry.text.clone(),
                    score,
                }
            })
            .collect())
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use askroute_core::ErrorKind;

    fn entry(doc: &str, position: u32, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            document_id: doc.to_string(),
            position,
            text: format!("{}#{}", doc, position),
            embedding,
        }
    }

    fn index(doc: &str, embeddings: Vec<Vec<f32>>) -> VectorIndex {
        let dims = embeddings[0].len();
        VectorIndex::from_entries(
            dims,
            embeddings
                .into_iter()
                .enumerate()
                .map(|(i, e)| entry(doc, i as u32, e))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let idx = index(
            "doc",
            vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0], vec![0.7, 0.7, 0.0]],
        );

        let hits = idx.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[1].position, 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_merge_keeps_both_sides() {
        let a = index("a", vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let b = index("b", vec![vec![0.5, 0.5]]);

        let merged = VectorIndex::merge(&a, &b).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.dimensions(), 2);
        assert_eq!(a.len(), 2, "inputs are not mutated");
    }

    #[test]
    fn test_merge_dimension_mismatch_fails() {
        let a = index("a", vec![vec![1.0, 0.0]]);
        let b = index("b", vec![vec![1.0, 0.0, 0.0]]);

        let err = VectorIndex::merge(&a, &b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_empty_index_adopts_dimensions() {
        let mut combined = VectorIndex::default();
        combined
            .merge_from(&index("a", vec![vec![1.0, 0.0, 0.0]]))
            .unwrap();
        assert_eq!(combined.dimensions(), 3);
    }

    #[test]
    fn test_build_rejects_length_mismatch() {
        let chunks = vec![Chunk {
            document_id: "d".to_string(),
            position: 0,
            text: "x".to_string(),
            start: 0,
        }];
        assert!(VectorIndex::build(&chunks, vec![]).is_err());
    }

    #[test]
    fn test_insert_rejects_wrong_dimension() {
        let mut idx = VectorIndex::new(2);
        assert!(idx.insert(entry("d", 0, vec![1.0])).is_err());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let idx = index("a", vec![vec![1.0, 0.0]]);
        assert!(idx.search(&[1.0, 0.0, 0.0], 3).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
