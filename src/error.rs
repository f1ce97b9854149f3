use thiserror::Error;

/// Errors produced by the retrieval engine and its service clients.
///
/// The kinds stay distinguishable for logging and retry decisions; the
/// request boundary collapses all of them into a single failure response.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid tuning parameters. Raised when configuring, never mid-query.
    #[error("configuration error: {0}")]
    Config(String),

    /// The corpus index was built from zero chunks.
    #[error("corpus '{0}' has no indexed chunks")]
    EmptyCorpus(String),

    /// A vector's dimensionality disagrees with the index.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding service failed, timed out or returned malformed data.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The answer-generation service failed or timed out.
    #[error("generation service error: {0}")]
    GenerationService(String),

    /// No index has been built for the requested corpus id.
    #[error("corpus '{0}' not found")]
    CorpusNotFound(String),

    /// A blocking task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Only the network-backed service errors are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingService(_) | RagError::GenerationService(_)
        )
    }

    /// Stable name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Config(_) => "config",
            RagError::EmptyCorpus(_) => "empty_corpus",
            RagError::DimensionMismatch { .. } => "dimension_mismatch",
            RagError::EmbeddingService(_) => "embedding_service",
            RagError::GenerationService(_) => "generation_service",
            RagError::CorpusNotFound(_) => "corpus_not_found",
            RagError::Internal(_) => "internal",
        }
    }
}

impl From<tokio::task::JoinError> for RagError {
    fn from(e: tokio::task::JoinError) -> Self {
        RagError::Internal(format!("blocking task failed: {e}"))
    }
}
