//! Pure functions for mapping chat errors to HTTP status codes.

use super::ChatError;

/// Maps a [`ChatError`] to an HTTP status code.
///
/// - `Validation` -> 400 (Bad Request)
/// - `NotFound` -> 404 (Not Found)
/// - `Conflict` -> 409 (Conflict)
/// - `TransactionFailed` -> 409 (Conflict)
/// - `Transient` -> 503 (Service Unavailable)
/// - `Unknown` -> 500 (Internal Server Error)
///
/// # Examples
///
/// ```
/// use groupchat_core::storage::{chat_error_to_status_code, ChatError};
///
/// let error = ChatError::NotFound {
///     entity_type: "Group",
///     id: "G1".to_string(),
/// };
/// assert_eq!(chat_error_to_status_code(&error), 404);
/// ```
pub fn chat_error_to_status_code(error: &ChatError) -> u16 {
    match error {
        ChatError::Validation(_) => 400,
        ChatError::NotFound { .. } => 404,
        ChatError::Conflict(_) => 409,
        ChatError::TransactionFailed(_) => 409,
        ChatError::Transient(_) => 503,
        ChatError::Unknown(_) => 500,
    }
}
