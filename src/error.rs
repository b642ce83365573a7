//! Error types for Svar.

use thiserror::Error;

/// Library-level error type for Svar operations.
#[derive(Error, Debug)]
pub enum SvarError {
    /// Invalid chunking, retrieval or provider parameters. Raised before any I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding or storage failure while replacing a collection.
    /// The previous collection is left untouched.
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    /// No collection is indexed under the requested document key.
    #[error("No content indexed for '{0}'")]
    NotFound(String),

    /// The answer generator failed after all retries.
    #[error("Generation unavailable: {0}")]
    Generation(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SvarError {
    /// Whether retrying the same call may succeed.
    ///
    /// Transport and provider failures are transient; configuration and
    /// lookup failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SvarError::Timeout(_) | SvarError::Http(_) | SvarError::OpenAI(_) | SvarError::Generation(_)
        )
    }

    /// Wrap any error raised on the ingestion path as an ingestion failure.
    pub(crate) fn into_ingestion(self) -> Self {
        match self {
            SvarError::Ingestion(_) | SvarError::Config(_) => self,
            other => SvarError::Ingestion(other.to_string()),
        }
    }
}

/// Result type alias for Svar operations.
pub type Result<T> = std::result::Result<T, SvarError>;
