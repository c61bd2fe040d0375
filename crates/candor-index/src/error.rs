//! Error types for candor-index.

/// Errors that can occur while building or querying the chunk index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files or the index snapshot.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// LLM provider error (embedding).
    #[error("LLM error: {0}")]
    Llm(#[from] candor_llm::LlmError),

    /// A vector did not match the index dimension.
    #[error("vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The index was built with a different embedding model.
    ///
    /// A silent model mismatch degrades retrieval quality without any
    /// visible failure, so it is rejected outright.
    #[error("embedding model mismatch: index built with '{indexed}', provider uses '{configured}'")]
    EmbeddingModelMismatch { indexed: String, configured: String },

    /// The configured provider cannot produce embeddings.
    #[error("provider '{0}' does not support embeddings")]
    NoEmbeddings(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
