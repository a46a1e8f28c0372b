//! Text chunking with configurable size and overlap.

use crate::types::Chunk;
use askroute_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Split a document's text into overlapping chunks.
///
/// Sizes are measured in characters. Chunk boundaries prefer paragraph,
/// sentence and word breaks before falling back to characters.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<Chunk>> {
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Config(format!("Invalid chunk configuration: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<Chunk> = splitter
        .chunk_indices(text)
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .enumerate()
        .map(|(position, (start, chunk))| Chunk {
            document_id: document_id.to_string(),
            position: position as u32,
            text: chunk.to_string(),
            start,
        })
        .collect();

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}
