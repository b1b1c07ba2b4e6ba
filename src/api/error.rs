//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::session::SignInError;

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    Forbidden(String),
    NotFound(String),
    Unauthorized(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal(context.into())
    }
}

/// Sign-in failures report only the sign-in page's error code, never which
/// part of the credentials was wrong.
impl From<SignInError> for ApiError {
    fn from(e: SignInError) -> Self {
        let code = e.code();
        match e {
            SignInError::AccessDenied => Self::Forbidden(code.into()),
            SignInError::InvalidCredentials | SignInError::BackendUnavailable => {
                Self::Unauthorized(code.into())
            }
            SignInError::Encoding(e) => Self::internal("Failed to sign session", e),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
