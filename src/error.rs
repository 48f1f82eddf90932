use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure the API can surface to a client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Duplicate identity field (email or username already in use).
    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    BadRequest(String),

    /// Missing, invalid or expired token, or bad credentials. Callers get a
    /// uniform rejection regardless of which check failed.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Account exists but has been deactivated.
    #[error("{0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            // Unique-constraint backstop for registrations racing past the
            // pre-insert existence checks.
            if db_err.is_unique_violation() {
                return if db_err.message().contains("users.email") {
                    ApiError::Conflict("Email already registered")
                } else {
                    ApiError::Conflict("Username already taken")
                };
            }
        }
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, (*msg).to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, (*msg).to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, (*msg).to_string()),
            ApiError::Internal(err) => {
                error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({ "detail": detail }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
