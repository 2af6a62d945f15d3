//! Error types for the retrieval engine

use crate::vector::Modality;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Error types that can occur in engine operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Configuration error: {reason}")]
    ConfigurationError { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Embedding failure ({modality}): {reason}")]
    EmbeddingFailure { modality: Modality, reason: String },

    #[error("Query deadline exceeded after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Index error: {0}")]
    IndexError(String),
}
