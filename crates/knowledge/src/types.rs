//! Knowledge system type definitions.

use askroute_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Caller-supplied metadata merged with processing counters.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Lifecycle of a Document record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Processed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| AppError::Storage(format!("Unknown document status: {}", value)))
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of source a Document was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Text,
    Markdown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Markdown => "markdown",
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        match value.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "text" | "txt" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(AppError::Validation(format!(
                "Unsupported source type: {}. Supported: pdf, text, markdown",
                other
            ))),
        }
    }

    /// Detect the source type from a file extension.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("pdf") => Ok(Self::Pdf),
            Some("txt") | Some("text") => Ok(Self::Text),
            Some("md") | Some("markdown") => Ok(Self::Markdown),
            _ => Err(AppError::Validation(format!(
                "Unsupported file type: {:?}. Supported extensions: .pdf, .txt, .md",
                path
            ))),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persistent Document record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,

    /// Full extracted text (empty until extraction succeeds)
    pub content: String,

    pub metadata: Metadata,
    pub source_type: SourceType,
    pub status: DocumentStatus,
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    /// SHA-256 of the uploaded bytes, hex encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    /// Failure reason when status is failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Fields needed to create a pending Document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub metadata: Metadata,
    pub source_type: SourceType,
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub content_hash: Option<String>,
}

/// A bounded span of document text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub position: u32,
    pub text: String,

    /// Byte offset of the chunk in the extracted text
    pub start: usize,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub document_id: String,
    pub position: u32,
    pub text: String,
    pub score: f32,
}

/// Aggregate processing statistics over all Document records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessingStats {
    pub total: u64,

    /// Record count per status name
    pub by_status: BTreeMap<String, u64>,

    /// Mean seconds between creation and completion, per status name
    pub avg_processing_secs: BTreeMap<String, f64>,
}
