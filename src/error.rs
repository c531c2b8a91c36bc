//! Error types for Elefante

use thiserror::Error;

/// Result type alias for Elefante operations
pub type Result<T> = std::result::Result<T, ElefanteError>;

/// Main error type for Elefante
#[derive(Error, Debug)]
pub enum ElefanteError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Memory not found: {0}")]
    NotFound(i64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    #[cfg(feature = "openai")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request error: {0}")]
    #[cfg(not(feature = "openai"))]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Duplicate memory detected (existing_id={existing_id}): {message}")]
    Duplicate { existing_id: i64, message: String },

    #[error("Internal error: {0}")]
    Internal(String),

    /// Caller-supplied input failed validation (malformed query, out-of-range
    /// threshold, unknown enum string past a safe-fallback boundary).
    #[error("Input error: {0}")]
    InputError(String),

    /// A required external collaborator (vector index, graph store, embedder)
    /// could not be reached or is locked by another process.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A suspension point (embedding call, ANN query) exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Persisted state violates an invariant the reader depends on (corrupt
    /// WAL entry, metadata that fails to decode after all fallbacks).
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Unrecoverable condition the caller should not retry.
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl ElefanteError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ElefanteError::Http(_) | ElefanteError::BackendUnavailable(_) | ElefanteError::Timeout(_)
        )
    }

    /// Get error code for MCP protocol
    pub fn code(&self) -> i64 {
        match self {
            ElefanteError::NotFound(_) => -32001,
            ElefanteError::InvalidInput(_) => -32602,
            ElefanteError::Conflict(_) => -32005,
            ElefanteError::Duplicate { .. } => -32006,
            ElefanteError::InputError(_) => -32602,
            ElefanteError::BackendUnavailable(_) => -32007,
            ElefanteError::Timeout(_) => -32008,
            ElefanteError::DataIntegrity(_) => -32009,
            ElefanteError::Fatal(_) => -32010,
            _ => -32000,
        }
    }
}
