//! Application error type
//!
//! Every failure surfaced over HTTP is converted to `AppError`, which
//! implements `IntoResponse` so handlers can return `Result<_, AppError>`
//! and get the right status code and a JSON `{"error": ...}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed payload, missing field, unknown type (400)
    #[error("{0}")]
    Input(String),

    /// Missing, invalid or revoked token (401)
    #[error("authentication required")]
    Unauthorized,

    /// Caller is not allowed to act on the resource (403)
    #[error("{0}")]
    Forbidden(String),

    /// Entity does not exist (404)
    #[error("{0}")]
    NotFound(String),

    /// Already friends, pending request exists, duplicate resource (409)
    #[error("{0}")]
    Conflict(String),

    /// Upload exceeds the configured cap (413)
    #[error("{0}")]
    Oversize(String),

    /// Duplicate create within a short window (429)
    #[error("too many requests, try again later")]
    Rate,

    /// Repository failure (500)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Log producer/consumer failure (500)
    #[error("log bus error: {0}")]
    Bus(String),

    /// Revocation store failure (500)
    #[error("revocation store error: {0}")]
    Revocation(#[from] redis::RedisError),

    /// Blob store failure (500)
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error (500)
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected invariant violation (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Input(format!("invalid payload: {err}"))
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Oversize(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Rate => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            Self::Database(_)
            | Self::Bus(_)
            | Self::Revocation(_)
            | Self::Storage(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures a log consumer should retry by not committing the
    /// offset; false means the record is permanently bad and must be skipped.
    pub fn is_transient(&self) -> bool {
        match self {
            // A missing row will still be missing on redelivery.
            Self::Database(sqlx::Error::RowNotFound) => false,
            Self::Database(_) | Self::Bus(_) | Self::Revocation(_) | Self::Storage(_) => true,
            _ => false,
        }
    }

}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status_code();

        // Internal details stay in the log; the client sees a generic message.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(serde_json::json!({ "error": message }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::Input("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("user".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Oversize("big".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(AppError::Rate.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(sqlx::Error::PoolClosed).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn transient_classification() {
        assert!(AppError::Database(sqlx::Error::PoolClosed).is_transient());
        assert!(AppError::Bus("broker down".into()).is_transient());
        assert!(!AppError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!AppError::Input("garbage".into()).is_transient());
        assert!(!AppError::Conflict("dup".into()).is_transient());
    }

    #[tokio::test]
    async fn internal_errors_are_sanitized() {
        let response = AppError::Internal("secret connection string".into()).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");
        assert!(text.contains("internal server error"));
        assert!(!text.contains("secret"));
    }

    #[tokio::test]
    async fn client_errors_keep_message() {
        let response = AppError::Conflict("friend request already pending".into()).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(body.to_vec()).expect("utf8");
        assert!(text.contains("friend request already pending"));
    }
}
