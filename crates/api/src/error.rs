//! API error taxonomy
//!
//! Every handler returns `ApiResult<T>`. Validation problems carry a
//! user-facing message; credential failures are always the same generic
//! message so a caller cannot learn which check failed; dependency
//! failures are logged server-side and surface as a bare 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input (400).
    #[error("{0}")]
    Validation(String),
    /// Bad credentials, invalid/expired token, subject mismatch (401).
    /// Deliberately carries no detail.
    #[error("Invalid or expired credentials")]
    Auth,
    /// Duplicate registration and similar (409).
    #[error("{0}")]
    Conflict(String),
    /// Per-caller resource lookup miss (404).
    #[error("{0}")]
    NotFound(String),
    /// A backing store or the mail sender failed (500). The source error
    /// is logged where it happens, never sent to the client.
    #[error("Internal server error")]
    Dependency,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "database error");
        ApiError::Dependency
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(e: redis::RedisError) -> Self {
        tracing::error!(error = %e, "redis error");
        ApiError::Dependency
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Auth => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired credentials".to_string(),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Dependency => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong".to_string(),
            ),
        };

        let body = Json(json!({
            "message": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let resp = ApiError::validation("Please provide an email").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn auth_is_generic_401() {
        let resp = ApiError::Auth.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn conflict_maps_to_409() {
        let resp = ApiError::conflict("User already exists").into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn dependency_hides_detail() {
        // The Display impl must not leak anything store-specific.
        assert_eq!(ApiError::Dependency.to_string(), "Internal server error");
        let resp = ApiError::Dependency.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
