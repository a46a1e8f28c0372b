//! Error types for askroute.
//!
//! This module defines a unified error enum covering the failure kinds the
//! question-answering engine surfaces to callers (validation, readiness,
//! provider, storage, execution) plus the ambient configuration, I/O,
//! prompt and serialization errors.

use thiserror::Error;

/// Unified error type for askroute.
///
/// All fallible functions return `Result<T, AppError>`. Each variant is a
/// distinct kind so that callers can branch on it without parsing messages.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad input content, unparseable document, router label outside the
    /// legal set, or a generated query that is not read-only.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No knowledge base is available, even after an on-demand rebuild.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Classification, generation or embedding capability unreachable,
    /// errored or timed out.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Document record or retrieval index persistence/load failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A generated structured query failed to execute.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error kind without the payload, for matching and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotReady,
    Provider,
    Storage,
    Execution,
    Config,
    Io,
    Prompt,
    Serialization,
}

impl ErrorKind {
    /// Stable lowercase name, used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotReady => "not_ready",
            Self::Provider => "provider",
            Self::Storage => "storage",
            Self::Execution => "execution",
            Self::Config => "config",
            Self::Io => "io",
            Self::Prompt => "prompt",
            Self::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Execution(_) => ErrorKind::Execution,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Prompt(_) => ErrorKind::Prompt,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether a bounded retry may succeed. Only provider failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            AppError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(AppError::NotReady("x".into()).kind(), ErrorKind::NotReady);
        assert_eq!(AppError::Execution("x".into()).kind(), ErrorKind::Execution);
        assert_eq!(ErrorKind::NotReady.to_string(), "not_ready");
    }

    #[test]
    fn test_only_provider_errors_are_retryable() {
        assert!(AppError::Provider("timeout".into()).is_retryable());
        assert!(!AppError::Validation("bad".into()).is_retryable());
        assert!(!AppError::Storage("disk".into()).is_retryable());
        assert!(!AppError::Execution("sql".into()).is_retryable());
    }

    #[test]
    fn test_serde_json_error_converts() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
