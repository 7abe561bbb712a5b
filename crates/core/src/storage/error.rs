use thiserror::Error;

use crate::chat::ValidationError;

use super::transaction::TransactionFailure;

/// Faults reported by a storage backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transaction canceled: {0}")]
    TransactionCanceled(TransactionFailure),
    #[error("Transient backend failure: {0}")]
    Transient(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Backend failure: {0}")]
    Backend(String),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transient(_) => true,
            StoreError::TransactionCanceled(failure) => failure.is_transient(),
            _ => false,
        }
    }
}

/// Domain errors surfaced by the handlers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Transaction failed: {0}")]
    TransactionFailed(TransactionFailure),
    #[error("Transient backend failure: {0}")]
    Transient(String),
    #[error("Unknown backend failure: {0}")]
    Unknown(String),
}

impl ChatError {
    /// Stable error kind rendered to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "ValidationError",
            ChatError::NotFound { .. } => "NotFoundError",
            ChatError::Conflict(_) => "ConflictError",
            ChatError::TransactionFailed(_) => "TransactionFailedError",
            ChatError::Transient(_) => "TransientError",
            ChatError::Unknown(_) => "UnknownError",
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TransactionCanceled(failure) if failure.is_transient() => {
                ChatError::Transient(format!("transaction canceled: {failure}"))
            }
            StoreError::TransactionCanceled(failure) => ChatError::TransactionFailed(failure),
            StoreError::Transient(msg) => ChatError::Transient(msg),
            StoreError::InvalidRequest(msg) => {
                ChatError::Validation(ValidationError::InvalidTransaction(msg))
            }
            StoreError::NotFound(msg) | StoreError::Backend(msg) | StoreError::InvalidData(msg) => {
                ChatError::Unknown(msg)
            }
        }
    }
}

/// Result type for backend calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
