//! HTTP mapping of [`RseError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rse_core::RseError;

/// Error returned by every handler.
///
/// Bodies are short fixed messages; backend detail only goes to the log.
#[derive(Debug)]
pub struct ApiError(pub RseError);

impl From<RseError> for ApiError {
    fn from(err: RseError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            RseError::Validation(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            RseError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
            RseError::Unavailable(detail) => {
                tracing::warn!(detail = %detail, "responding 503, backend unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "service unavailable").into_response()
            }
            RseError::AllocationExhausted { attempts } => {
                tracing::warn!(attempts, "responding 503, id allocation exhausted");
                (StatusCode::SERVICE_UNAVAILABLE, "service unavailable").into_response()
            }
            RseError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
