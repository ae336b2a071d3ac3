//! Error taxonomy shared by every docchat component.
//!
//! Provider implementations map their transport errors into the variant
//! matching the collaborator that failed, so callers can tell an
//! extraction problem from an embedding or vector-store problem without
//! string matching.

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The uploaded file's extension has no extractor.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The extractor recognised the type but could not produce text.
    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("embedding provider failure: {0}")]
    EmbeddingProvider(String),

    #[error("vector store failure: {0}")]
    VectorStore(String),

    /// A multi-request write failed part way through. Some entries may
    /// already be visible in the namespace.
    #[error("write to namespace '{namespace}' failed after a partial write: {message}")]
    IndeterminateWrite { namespace: String, message: String },

    #[error("model provider failure: {0}")]
    ModelProvider(String),

    /// Malformed chat request (bad history role, missing message).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("configuration error: {0}")]
    Config(String),

    /// Every configured retry of an external call failed.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl Error {
    /// Whether the error was caused by the caller rather than a provider.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidRequest(_) | Error::UnsupportedFileType(_)
        )
    }
}
