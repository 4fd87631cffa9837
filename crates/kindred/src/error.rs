//! Error types for Kindred

use thiserror::Error;

use crate::memory::types::OwnerIdError;

/// Main error type for Kindred operations
#[derive(Error, Debug)]
pub enum KindredError {
    /// The persistent memory tier could not serve a search or write
    /// (backend down, storage failure, or the call exceeded its time budget)
    #[error("Memory unavailable: {0}")]
    MemoryUnavailable(String),

    /// Turn classification (sentiment, preferences, facts) failed
    #[error("Classification failed: {0}")]
    Classification(String),

    /// The response generation provider could not produce text
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Storage-related errors (LanceDB, file system, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding generation errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Owner identifier failed validation
    #[error("Invalid owner: {0}")]
    InvalidOwner(#[from] OwnerIdError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KindredError {
    /// Whether this error means the persistent tier is unreachable.
    ///
    /// Callers treat this as recoverable: retrieval degrades to session-only
    /// context and writes are dropped.
    pub fn is_memory_unavailable(&self) -> bool {
        matches!(self, KindredError::MemoryUnavailable(_))
    }

    /// Collapse storage and embedding failures into `MemoryUnavailable`.
    ///
    /// Index backends call this at the trait boundary so the orchestrator
    /// only has to recognise one failure kind.
    pub fn into_memory_unavailable(self) -> Self {
        match self {
            KindredError::MemoryUnavailable(_) => self,
            other => KindredError::MemoryUnavailable(other.to_string()),
        }
    }
}

/// Result type alias for Kindred operations
pub type Result<T> = std::result::Result<T, KindredError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_maps_to_memory_unavailable() {
        let err = KindredError::Storage("table missing".to_string()).into_memory_unavailable();
        assert!(err.is_memory_unavailable());
        assert!(err.to_string().contains("table missing"));
    }

    #[test]
    fn test_memory_unavailable_is_kept_as_is() {
        let err = KindredError::MemoryUnavailable("timed out".to_string()).into_memory_unavailable();
        assert_eq!(err.to_string(), "Memory unavailable: timed out");
    }

    #[test]
    fn test_other_errors_are_not_memory_unavailable() {
        assert!(!KindredError::Classification("x".to_string()).is_memory_unavailable());
        assert!(!KindredError::ProviderUnavailable("x".to_string()).is_memory_unavailable());
    }
}
