//! Maps the domain error taxonomy onto HTTP statuses with a stable
//! `{code, message}` envelope, so clients branch on `code` instead of
//! parsing prose.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::AppError;
use serde_json::json;
use tracing::error;

pub struct ApiError(pub AppError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            AppError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::NotFound(_, _) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream"),
            AppError::TxnConflict | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        // 5xx details go to the log, not the wire.
        let message = if status.is_server_error() {
            error!(error = %self.0, "request failed");
            "internal service error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({ "code": code, "message": message }))).into_response()
    }
}
