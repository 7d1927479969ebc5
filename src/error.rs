//! Error types for conversion and queue operations

use thiserror::Error;

/// Result type alias for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors surfaced by the conversion pipeline.
///
/// Malformed or empty markup is never an error: it converts to empty output.
/// Only a missing document or a failing collaborator ends a conversion early.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No document was supplied at all
    #[error("No input document supplied: {0}")]
    MissingInput(String),

    /// Document source collaborator could not deliver markup
    #[error("Failed to load document from {source_ref}: {message}")]
    LoadFailed { source_ref: String, message: String },

    /// Base URL could not be parsed
    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ConvertError {
    fn from(error: anyhow::Error) -> Self {
        ConvertError::Other(error.to_string())
    }
}

impl ConvertError {
    /// Check if the failure is worth a manual retry
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConvertError::Http(_) | ConvertError::Io(_) | ConvertError::LoadFailed { .. }
        )
    }
}

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors returned by task queue bookkeeping calls
#[derive(Debug, Error)]
pub enum QueueError {
    /// No task with this id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Lifecycle transition not allowed from the current status
    #[error("Task {id} cannot go from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// Snapshot could not be (de)serialized
    #[error("Queue snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for QueueError {
    fn from(error: anyhow::Error) -> Self {
        QueueError::Other(error.to_string())
    }
}
