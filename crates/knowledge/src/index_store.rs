//! SQLite-backed persistence of per-document indexes.
//!
//! Each processed document owns one file `indexes/<document_id>.sqlite`.
//! Writes go to a temporary file that is renamed into place, so a reader
//! never observes a half-written index.

use crate::index::{IndexEntry, VectorIndex};
use askroute_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Durable storage of per-document indexes, keyed by document id.
pub trait IndexStore: Send + Sync {
    fn save(&self, document_id: &str, index: &VectorIndex) -> AppResult<()>;
    fn load(&self, document_id: &str) -> AppResult<VectorIndex>;
    fn delete(&self, document_id: &str) -> AppResult<()>;
    fn exists(&self, document_id: &str) -> bool;
}

/// One SQLite file per document under a directory.
#[derive(Debug, Clone)]
pub struct SqliteIndexStore {
    dir: PathBuf,
}

impl SqliteIndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, document_id: &str) -> AppResult<PathBuf> {
        let valid = !document_id.is_empty()
            && document_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::Storage(format!(
                "Invalid document id for index path: {:?}",
                document_id
            )));
        }
        Ok(self.dir.join(format!("{}.sqlite", document_id)))
    }

    fn write_file(path: &Path, index: &VectorIndex) -> AppResult<()> {
        let mut conn = Connection::open(path)
            .map_err(|e| AppError::Storage(format!("Failed to open index file: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE chunks (
                position INTEGER PRIMARY KEY,
                document_id TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create index tables: {}", e)))?;

        let tx = conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO meta (key, value) VALUES ('dimensions', ?1)",
            params![index.dimensions().to_string()],
        )
        .map_err(|e| AppError::Storage(format!("Failed to write index metadata: {}", e)))?;

        for entry in index.entries() {
            tx.execute(
                "INSERT INTO chunks (position, document_id, text, embedding) VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.position as i64,
                    entry.document_id,
                    entry.text,
                    embedding_to_bytes(&entry.embedding),
                ],
            )
            .map_err(|e| AppError::Storage(format!("Failed to insert chunk: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit index: {}", e)))?;
        Ok(())
    }
}

impl IndexStore for SqliteIndexStore {
    fn save(&self, document_id: &str, index: &VectorIndex) -> AppResult<()> {
        let path = self.path_for(document_id)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| AppError::Storage(format!("Failed to create index directory: {}", e)))?;

        let tmp = path.with_extension("sqlite.tmp");
        if tmp.exists() {
            std::fs::remove_file(&tmp)
                .map_err(|e| AppError::Storage(format!("Failed to clear stale index: {}", e)))?;
        }

        if let Err(e) = Self::write_file(&tmp, index) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        std::fs::rename(&tmp, &path)
            .map_err(|e| AppError::Storage(format!("Failed to move index into place: {}", e)))?;

        tracing::debug!(
            "Persisted index for {} ({} chunks) at {:?}",
            document_id,
            index.len(),
            path
        );
        Ok(())
    }

    fn load(&self, document_id: &str) -> AppResult<VectorIndex> {
        let path = self.path_for(document_id)?;
        if !path.exists() {
            return Err(AppError::Storage(format!(
                "No index persisted for document {}",
                document_id
            )));
        }

        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| AppError::Storage(format!("Failed to open index {:?}: {}", path, e)))?;

        let dimensions: String = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Storage(format!("Failed to read index metadata: {}", e)))?;
        let dimensions: usize = dimensions
            .parse()
            .map_err(|e| AppError::Storage(format!("Corrupt index dimensions: {}", e)))?;

        let mut stmt = conn
            .prepare("SELECT position, document_id, text, embedding FROM chunks ORDER BY position")
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .map_err(|e| AppError::Storage(format!("Failed to query chunks: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            let (position, document_id, text, bytes) =
                row.map_err(|e| AppError::Storage(format!("Failed to read chunk: {}", e)))?;
            entries.push(IndexEntry {
                document_id,
                position: position as u32,
                text,
                embedding: bytes_to_embedding(&bytes)?,
            });
        }

        VectorIndex::from_entries(dimensions, entries)
    }

    fn delete(&self, document_id: &str) -> AppResult<()> {
        let path = self.path_for(document_id)?;
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| AppError::Storage(format!("Failed to delete index: {}", e)))?;
        }
        Ok(())
    }

    fn exists(&self, document_id: &str) -> bool {
        self.path_for(document_id)
            .map(|path| path.exists())
            .unwrap_or(false)
    }
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Storage(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use askroute_core::ErrorKind;
    use tempfile::TempDir;

    fn sample_index(doc: &str) -> VectorIndex {
        VectorIndex::from_entries(
            3,
            vec![
                IndexEntry {
                    document_id: doc.to_string(),
                    position: 0,
                    text: "first".to_string(),
                    embedding: vec![1.0, 0.0, 0.0],
                },
                IndexEntry {
                    document_id: doc.to_string(),
                    position: 1,
                    text: "second".to_string(),
                    embedding: vec![0.0, 0.5, -0.25],
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp.path().join("indexes"));
        let index = sample_index("doc-1");

        store.save("doc-1", &index).unwrap();
        assert!(store.exists("doc-1"));
        assert!(!temp.path().join("indexes/doc-1.sqlite.tmp").exists());

        let loaded = store.load("doc-1").unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_save_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp.path());

        store.save("doc-1", &sample_index("doc-1")).unwrap();
        store.save("doc-1", &VectorIndex::new(3)).unwrap();

        assert!(store.load("doc-1").unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_is_storage_error() {
        let temp = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp.path());
        let err = store.load("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_load_corrupt_file_is_storage_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("doc-1.sqlite"), b"definitely not sqlite").unwrap();
        let store = SqliteIndexStore::new(temp.path());

        let err = store.load("doc-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let temp = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp.path());
        assert!(store.save("../escape", &sample_index("x")).is_err());
        assert!(!store.exists("../escape"));
    }

    #[test]
    fn test_delete() {
        let temp = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(temp.path());
        store.save("doc-1", &sample_index("doc-1")).unwrap();
        store.delete("doc-1").unwrap();
        assert!(!store.exists("doc-1"));
        store.delete("doc-1").unwrap();
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let values = vec![0.5, -1.25, 3.0];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&values)).unwrap(), values);
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
    }
}
