//! Error taxonomy for the memory layer.
//!
//! Three failure families reach callers: [`ValidationError`] (bad input, rejected before any
//! external call), [`ProviderError`] (embedding generation failed) and [`StorageError`] (the
//! backing collection failed). The engine wraps the latter two in [`MemoryError`] together
//! with the operation and project that failed. Zero matches is never an error.

use thiserror::Error;

/// Input rejected before any external call was made.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    #[error("{0} must be a finite number")]
    NonFinite(&'static str),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// All-zero or non-finite vectors are never written.
    #[error("embedding is degenerate (all zeros or non-finite values)")]
    DegenerateEmbedding,
}

/// The embedding provider could not produce vectors.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("local embedding model failed: {0:#}")]
    Local(anyhow::Error),

    #[error("embedding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The backing collection could not complete a read or write.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("refusing to write invalid record: {0}")]
    Invalid(#[from] ValidationError),

    #[error("collection '{0}' does not exist")]
    MissingCollection(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Engine operation names, carried in errors for the caller's logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Save,
    Recall,
    History,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Recall => "recall",
            Self::History => "history",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by [`crate::memory::MemoryEngine`] operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("{operation} failed for project '{project_id}': {source}")]
    Provider {
        operation: Operation,
        project_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("{operation} failed for project '{project_id}': {source}")]
    Storage {
        operation: Operation,
        project_id: String,
        #[source]
        source: StorageError,
    },
}

impl MemoryError {
    pub(crate) fn provider(operation: Operation, project_id: &str, source: ProviderError) -> Self {
        Self::Provider {
            operation,
            project_id: project_id.to_string(),
            source,
        }
    }

    pub(crate) fn storage(operation: Operation, project_id: &str, source: StorageError) -> Self {
        Self::Storage {
            operation,
            project_id: project_id.to_string(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_names_operation_and_project() {
        let err = MemoryError::storage(
            Operation::History,
            "inventory",
            StorageError::MissingCollection("project_memories".into()),
        );
        let msg = err.to_string();
        assert!(msg.contains("history"));
        assert!(msg.contains("inventory"));
        assert!(msg.contains("project_memories"));
    }

    #[test]
    fn validation_converts_into_memory_error() {
        let err: MemoryError = ValidationError::EmptyField("text").into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "invalid request: text must not be empty");
    }
}
