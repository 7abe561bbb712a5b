use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use groupchat_core::storage::{chat_error_to_status_code, ChatError, OperationOutcome};

pub struct AppError(pub anyhow::Error);

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    kind: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcomes: Option<&'a [OperationOutcome]>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, kind, outcomes) = match self.0.downcast_ref::<ChatError>() {
            Some(chat_error) => {
                let code = chat_error_to_status_code(chat_error);
                let outcomes = match chat_error {
                    ChatError::TransactionFailed(failure) => Some(failure.outcomes.as_slice()),
                    _ => None,
                };
                (
                    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    chat_error.kind(),
                    outcomes,
                )
            }
            None => (StatusCode::INTERNAL_SERVER_ERROR, "UnknownError", None),
        };

        if status_code.is_server_error() {
            tracing::error!(status = %status_code, kind, error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = %status_code, kind, error = %self.0, "Request rejected");
        }

        let body = ErrorBody {
            kind,
            message: self.0.to_string(),
            outcomes,
        };
        (status_code, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
