//! Error types for shopsearch-search

use thiserror::Error;

/// Errors that can occur in shopsearch-search operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// Embedding provider disabled or missing credentials
    #[error("Embeddings not configured: {0}")]
    Configuration(String),

    /// Non-success or malformed response from an external service
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Caller passed unusable input (e.g. blank text to embed)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =========================================================================
    // Provider errors
    // =========================================================================
    /// Request exceeded its deadline
    #[error("{0} timed out")]
    Timeout(String),

    /// Provider temporarily unreachable (connect failure, 5xx)
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider rate limited the request
    #[error("Embedding provider rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Embedding dimension mismatch
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector index failure
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    // =========================================================================
    // Infrastructure errors
    // =========================================================================
    /// Document store failure
    #[error("Product store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes used for fallback decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Provider disabled or missing credentials
    Configuration,
    /// Provider or vector index misbehaved
    ExternalService,
    /// Caller error
    InvalidInput,
    /// Document store, serialization or IO failure
    Infrastructure,
}

impl SearchError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::Configuration(_) => ErrorKind::Configuration,
            SearchError::ExternalService(_)
            | SearchError::Timeout(_)
            | SearchError::ProviderUnavailable(_)
            | SearchError::RateLimited { .. }
            | SearchError::DimensionMismatch { .. }
            | SearchError::VectorIndex(_) => ErrorKind::ExternalService,
            SearchError::InvalidInput(_) => ErrorKind::InvalidInput,
            SearchError::Store(_) | SearchError::Serialization(_) | SearchError::Io(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Whether a semantic search failing with this error degrades to lexical results.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::ExternalService
        )
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SearchError::RateLimited { .. }
                | SearchError::Timeout(_)
                | SearchError::ProviderUnavailable(_)
        )
    }
}

impl From<qdrant_client::QdrantError> for SearchError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        SearchError::VectorIndex(err.to_string())
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(err: rusqlite::Error) -> Self {
        SearchError::Store(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SearchError {
    fn from(err: tokio::task::JoinError) -> Self {
        SearchError::Store(format!("store task failed: {}", err))
    }
}

/// Result type for shopsearch-search operations
pub type Result<T> = std::result::Result<T, SearchError>;
