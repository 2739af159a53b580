//! Error types for kbchat.
//!
//! This module defines a unified error enum that covers all error categories
//! in the service: configuration, I/O, LLM providers, knowledge-base
//! retrieval, prompt rendering and request validation.

use thiserror::Error;

/// Unified error type for kbchat.
///
/// All fallible functions return `Result<T, AppError>`. The HTTP layer maps
/// each variant onto a status code, so variants are split by who is at fault
/// rather than by which crate raised them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (raised during inference)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base errors not covered by a more specific variant
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A named resource (knowledge base, document) does not exist
    #[error("{0}")]
    NotFound(String),

    /// The requested model matches no supported provider family
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// The search collaborator failed
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Request parameters outside their documented range
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

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
