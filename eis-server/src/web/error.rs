//! HTTP mapping for [`EisError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::error::{EisError, ErrorKind, FieldError};

/// Status code for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for EisError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());

        let body = match self {
            EisError::Validation(details) => ErrorBody {
                success: false,
                error: "Validation failed".to_string(),
                details: Some(details),
            },
            EisError::Internal(ref msg) => {
                error!(error = %msg, "internal_error");
                ErrorBody {
                    success: false,
                    error: "Internal server error".to_string(),
                    details: None,
                }
            }
            other => ErrorBody {
                success: false,
                error: other.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
