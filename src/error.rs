use std::collections::BTreeMap;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::token::TokenError;

/// Field name to list of human-readable problems with it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Authentication Errors
///
/// Every bearer-token failure surfaces as `Unauthorized` with the same body.
/// The precise reason (missing header, bad signature, expiry) is logged by
/// the authentication layer and never returned to the client.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Too many requests, retry after {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64, limit: u32 },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Failed to issue token: {0}")]
    TokenIssue(#[source] TokenError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Single-field validation failure.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials | AppError::IncorrectPassword => {
                StatusCode::UNAUTHORIZED
            }
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::TokenIssue(_) | AppError::Internal(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    status: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl ErrorResponse {
    fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: false,
            error,
            message: message.into(),
            errors: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        match self {
            AppError::Unauthorized => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                axum::Json(ErrorResponse::new("unauthorized", "Unauthorized")),
            )
                .into_response(),
            AppError::InvalidCredentials => (
                status,
                axum::Json(ErrorResponse::new(
                    "invalid_credentials",
                    "Invalid email or password",
                )),
            )
                .into_response(),
            AppError::IncorrectPassword => (
                status,
                axum::Json(ErrorResponse::new(
                    "incorrect_password",
                    "Current password is incorrect",
                )),
            )
                .into_response(),
            AppError::TooManyRequests {
                retry_after_secs,
                limit,
            } => (
                status,
                [
                    ("retry-after", retry_after_secs.to_string()),
                    ("x-ratelimit-limit", limit.to_string()),
                    ("x-ratelimit-remaining", "0".to_string()),
                ],
                axum::Json(ErrorResponse::new(
                    "too_many_requests",
                    "Too many login attempts. Please try again later.",
                )),
            )
                .into_response(),
            AppError::NotFound(msg) => {
                (status, axum::Json(ErrorResponse::new("not_found", msg))).into_response()
            }
            AppError::Conflict(msg) => {
                (status, axum::Json(ErrorResponse::new("conflict", msg))).into_response()
            }
            AppError::BadRequest(msg) => {
                (status, axum::Json(ErrorResponse::new("bad_request", msg))).into_response()
            }
            AppError::Validation(errors) => {
                let mut body = ErrorResponse::new("validation_failed", "Validation failed");
                body.errors = Some(errors);
                (status, axum::Json(body)).into_response()
            }

            // Internal errors - never expose internal details to clients
            AppError::TokenIssue(_) => (
                status,
                axum::Json(ErrorResponse::new(
                    "token_error",
                    "Failed to generate token",
                )),
            )
                .into_response(),
            AppError::Internal(_) => (
                status,
                axum::Json(ErrorResponse::new(
                    "internal_error",
                    "An internal error occurred. Please contact support if the issue persists.",
                )),
            )
                .into_response(),
            AppError::ConfigError(_) => (
                status,
                axum::Json(ErrorResponse::new(
                    "config_error",
                    "Service configuration error. Please contact support.",
                )),
            )
                .into_response(),
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
