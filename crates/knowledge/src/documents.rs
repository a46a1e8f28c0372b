//! Document record store.
//!
//! Records are created `pending` when an ingestion starts and only ever move
//! forward: `pending -> processing -> processed | failed`.

use crate::types::{Document, DocumentStatus, Metadata, NewDocument, ProcessingStats, SourceType};
use askroute_core::{AppError, AppResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Persistence of Document records.
pub trait DocumentStore: Send + Sync {
    /// Insert a new record with status `pending`.
    fn create(&self, document: NewDocument) -> AppResult<Document>;

    fn set_status(&self, document_id: &str, status: DocumentStatus) -> AppResult<()>;

    /// Store extracted text and final metadata, and flip the record to `processed`.
    fn mark_processed(
        &self,
        document_id: &str,
        content: &str,
        metadata: &Metadata,
    ) -> AppResult<Document>;

    /// Flip the record to `failed`, keeping the reason.
    fn mark_failed(&self, document_id: &str, error: &str) -> AppResult<()>;

    fn get(&self, document_id: &str) -> AppResult<Option<Document>>;

    /// Ids of all processed documents, oldest first.
    fn list_processed_documents(&self) -> AppResult<Vec<String>>;

    /// Documents newest first by completion (or creation) time.
    fn list(&self, skip: usize, limit: usize) -> AppResult<Vec<Document>>;

    fn processing_stats(&self) -> AppResult<ProcessingStats>;
}

/// `DocumentStore` backed by a single SQLite database.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

const COLUMNS: &str = "id, title, content, metadata, source_type, status, embedding_model, \
                       chunk_size, chunk_overlap, content_hash, error, created_at, processed_at";

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Storage(format!("Invalid timestamp {:?}: {}", value, e)))
}

/// Raw column values, converted to a `Document` outside the rusqlite closure.
struct DocumentRow {
    id: String,
    title: String,
    content: String,
    metadata: String,
    source_type: String,
    status: String,
    embedding_model: String,
    chunk_size: i64,
    chunk_overlap: i64,
    content_hash: Option<String>,
    error: Option<String>,
    created_at: String,
    processed_at: Option<String>,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            metadata: row.get(3)?,
            source_type: row.get(4)?,
            status: row.get(5)?,
            embedding_model: row.get(6)?,
            chunk_size: row.get(7)?,
            chunk_overlap: row.get(8)?,
            content_hash: row.get(9)?,
            error: row.get(10)?,
            created_at: row.get(11)?,
            processed_at: row.get(12)?,
        })
    }

    fn into_document(self) -> AppResult<Document> {
        let metadata: Metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| AppError::Storage(format!("Corrupt metadata for {}: {}", self.id, e)))?;
        let source_type = SourceType::parse(&self.source_type)
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(Document {
            title: self.title,
            content: self.content,
            metadata,
            source_type,
            status: DocumentStatus::parse(&self.status)?,
            embedding_model: self.embedding_model,
            chunk_size: self.chunk_size as usize,
            chunk_overlap: self.chunk_overlap as usize,
            content_hash: self.content_hash,
            error: self.error,
            created_at: parse_timestamp(&self.created_at)?,
            processed_at: self
                .processed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            id: self.id,
        })
    }
}

impl SqliteDocumentStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create document store directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Storage(format!("Failed to open document store: {}", e)))?;
        Self::init(conn)
    }

    /// A store that lives only as long as the value.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("Failed to open document store: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                metadata TEXT NOT NULL,
                source_type TEXT NOT NULL,
                status TEXT NOT NULL,
                embedding_model TEXT NOT NULL,
                chunk_size INTEGER NOT NULL,
                chunk_overlap INTEGER NOT NULL,
                content_hash TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                processed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
            "#,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Storage("Document store lock poisoned".to_string()))?;
        f(&conn)
    }

    fn update(
        &self,
        document_id: &str,
        sql: &str,
        values: &[&dyn rusqlite::ToSql],
    ) -> AppResult<()> {
        let changed = self.with_conn(|conn| {
            conn.execute(sql, values)
                .map_err(|e| AppError::Storage(format!("Failed to update document: {}", e)))
        })?;

        if changed == 0 {
            return Err(AppError::Storage(format!(
                "Document not found: {}",
                document_id
            )));
        }
        Ok(())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn create(&self, new: NewDocument) -> AppResult<Document> {
        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            title: new.title,
            content: String::new(),
            metadata: new.metadata,
            source_type: new.source_type,
            status: DocumentStatus::Pending,
            embedding_model: new.embedding_model,
            chunk_size: new.chunk_size,
            chunk_overlap: new.chunk_overlap,
            content_hash: new.content_hash,
            error: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        let metadata = serde_json::to_string(&document.metadata)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, title, content, metadata, source_type, status, \
                 embedding_model, chunk_size, chunk_overlap, content_hash, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    document.id,
                    document.title,
                    document.content,
                    metadata,
                    document.source_type.as_str(),
                    document.status.as_str(),
                    document.embedding_model,
                    document.chunk_size as i64,
                    document.chunk_overlap as i64,
                    document.content_hash,
                    timestamp(document.created_at),
                ],
            )
            .map_err(|e| AppError::Storage(format!("Failed to insert document: {}", e)))
        })?;

        tracing::debug!("Created document record {} ({})", document.id, document.title);
        Ok(document)
    }

    fn set_status(&self, document_id: &str, status: DocumentStatus) -> AppResult<()> {
        self.update(
            document_id,
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            &[&status.as_str(), &document_id],
        )
    }

    fn mark_processed(
        &self,
        document_id: &str,
        content: &str,
        metadata: &Metadata,
    ) -> AppResult<Document> {
        let metadata = serde_json::to_string(metadata)?;
        self.update(
            document_id,
            "UPDATE documents SET status = ?1, content = ?2, metadata = ?3, error = NULL, \
             processed_at = ?4 WHERE id = ?5",
            &[
                &DocumentStatus::Processed.as_str(),
                &content,
                &metadata,
                &timestamp(Utc::now()),
                &document_id,
            ],
        )?;

        self.get(document_id)?
            .ok_or_else(|| AppError::Storage(format!("Document not found: {}", document_id)))
    }

    fn mark_failed(&self, document_id: &str, error: &str) -> AppResult<()> {
        self.update(
            document_id,
            "UPDATE documents SET status = ?1, error = ?2, processed_at = ?3 WHERE id = ?4",
            &[
                &DocumentStatus::Failed.as_str(),
                &error,
                &timestamp(Utc::now()),
                &document_id,
            ],
        )
    }

    fn get(&self, document_id: &str) -> AppResult<Option<Document>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", COLUMNS),
                params![document_id],
                DocumentRow::from_row,
            )
            .optional()
            .map_err(|e| AppError::Storage(format!("Failed to read document: {}", e)))
        })?;

        row.map(DocumentRow::into_document).transpose()
    }

    fn list_processed_documents(&self) -> AppResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id FROM documents WHERE status = ?1 ORDER BY created_at, id")
                .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

            let ids = stmt
                .query_map(params![DocumentStatus::Processed.as_str()], |row| row.get(0))
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
                .map_err(|e| AppError::Storage(format!("Failed to list documents: {}", e)))?;
            Ok(ids)
        })
    }

    fn list(&self, skip: usize, limit: usize) -> AppResult<Vec<Document>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM documents \
                     ORDER BY COALESCE(processed_at, created_at) DESC, id \
                     LIMIT ?1 OFFSET ?2",
                    COLUMNS
                ))
                .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

            let rows = stmt
                .query_map(params![limit as i64, skip as i64], DocumentRow::from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| AppError::Storage(format!("Failed to list documents: {}", e)))?;
            Ok(rows)
        })?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    fn processing_stats(&self) -> AppResult<ProcessingStats> {
        let rows: Vec<(String, String, Option<String>)> = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT status, created_at, processed_at FROM documents")
                .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| AppError::Storage(format!("Failed to read statistics: {}", e)))?;
            Ok(rows)
        })?;

        let mut stats = ProcessingStats::default();
        let mut durations: BTreeMap<String, (f64, u64)> = BTreeMap::new();

        for (status, created_at, processed_at) in rows {
            stats.total += 1;
            *stats.by_status.entry(status.clone()).or_insert(0) += 1;

            if let Some(processed_at) = processed_at {
                let elapsed = parse_timestamp(&processed_at)? - parse_timestamp(&created_at)?;
                let secs = elapsed.num_microseconds().unwrap_or(0) as f64 / 1_000_000.0;
                let slot = durations.entry(status).or_insert((0.0, 0));
                slot.0 += secs;
                slot.1 += 1;
            }
        }

        stats.avg_processing_secs = durations
            .into_iter()
            .map(|(status, (sum, count))| (status, sum / count as f64))
            .collect();

        Ok(stats)
    }
}
