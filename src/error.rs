// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether 500 responses carry the underlying error message.
/// Set once at startup from the configured environment.
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Enable or disable detailed messages on internal errors (development only).
pub fn set_expose_internal_errors(expose: bool) {
    EXPOSE_INTERNAL_ERRORS.store(expose, Ordering::Relaxed);
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Google API authentication failed: {0}")]
    GoogleAuth(String),

    #[error("Google API access forbidden: {0}")]
    GoogleForbidden(String),

    #[error("Google API error: {0}")]
    GoogleApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the provider refused our credentials (expired, revoked or
    /// rejected refresh token). Callers surface these as 401.
    pub fn is_google_auth_error(&self) -> bool {
        matches!(self, AppError::GoogleAuth(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let expose = EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed);

        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::GoogleAuth(msg) => {
                tracing::warn!(error = %msg, "Google API authentication failed");
                (
                    StatusCode::UNAUTHORIZED,
                    "google_auth_failed",
                    Some("Google API authentication failed".to_string()),
                )
            }
            AppError::GoogleForbidden(msg) => {
                tracing::warn!(error = %msg, "Google API access forbidden");
                (
                    StatusCode::FORBIDDEN,
                    "google_forbidden",
                    Some("Google API access forbidden".to_string()),
                )
            }
            AppError::GoogleApi(msg) => {
                tracing::error!(error = %msg, "Google API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "google_error",
                    expose.then(|| msg.clone()),
                )
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    expose.then(|| msg.clone()),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    expose.then(|| err.to_string()),
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
