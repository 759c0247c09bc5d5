//! Error types for Courier.
//!
//! One error enum covers configuration, I/O, model calls, index building,
//! snapshot persistence and directory watching.

use thiserror::Error;

/// Unified error type for Courier.
///
/// Library code returns `Result<T, AppError>` and never panics on bad input.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Answer-generation model errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Index construction and search errors
    #[error("Index error: {0}")]
    Index(String),

    /// A query ran before any snapshot was built
    #[error("No index present")]
    IndexAbsent,

    /// Writing the new snapshot failed; the previous snapshot is still current
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The cross-process index lock could not be taken
    #[error("Lock error: {0}")]
    Lock(String),

    /// Directory watch errors
    #[error("Watch error: {0}")]
    Watch(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
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
