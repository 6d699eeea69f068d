//! The HTTP boundary's error taxonomy: every `ExportError` collapses into
//! a status code and a `{error: ...}` JSON body here, with internal errors
//! redacted behind a correlation id before reaching the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use export_protocol::ExportError;
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub struct ApiError(pub ExportError);

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ExportError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ExportError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            ExportError::State { state, message } => (
                StatusCode::from_u16(425).unwrap(),
                format!("Export is {state}. {message}"),
            ),
            ExportError::Range => (StatusCode::RANGE_NOT_SATISFIABLE, "range not satisfiable".to_string()),
            ExportError::Database(_) | ExportError::Io(_) | ExportError::Internal(_) => {
                let correlation_id = uuid::Uuid::new_v4();
                error!(correlation_id = %correlation_id, error = %self.0, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("internal error (reference: {correlation_id})"),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
