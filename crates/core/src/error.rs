//! Error types for benebot.
//!
//! A single error enum covers every failure category in the workspace:
//! configuration, I/O, LLM providers, retrieval, session persistence,
//! prompt rendering and serialization.

use thiserror::Error;

/// Unified error type for benebot.
///
/// All fallible functions return `Result<T, AppError>`. Errors are
/// propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (completion or streaming)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding and vector index errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Intent classification errors
    #[error("Intent error: {0}")]
    Intent(String),

    /// Session checkpoint store errors
    #[error("Session error: {0}")]
    Session(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

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
