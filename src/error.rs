// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Transport failure or non-success status from the remote service.
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// Identifier resolution found no matching record.
    #[error("Activity not found: {0}")]
    EntityNotFound(String),

    /// A local precondition was violated; nothing was sent to the remote.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The remote answered, but the payload was missing expected fields.
    #[error("Malformed response from remote service: {0}")]
    MalformedResponse(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short machine-readable code used in JSON bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::RemoteUnavailable(_) => "remote_unavailable",
            AppError::EntityNotFound(_) => "not_found",
            AppError::InvalidOperation(_) => "invalid_operation",
            AppError::MalformedResponse(_) => "malformed_response",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RemoteUnavailable(_) | AppError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Non-fatal, user-visible message produced at the mutation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&AppError> for Notification {
    fn from(err: &AppError) -> Self {
        let message = match err {
            AppError::RemoteUnavailable(_) | AppError::MalformedResponse(_) => {
                "Could not reach the activity service. Please try again.".to_string()
            }
            AppError::EntityNotFound(_) => "Could not find entity for this activity".to_string(),
            AppError::InvalidOperation(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Internal(_) => "Something went wrong. Please try again.".to_string(),
        };
        Notification::error(message)
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
        let status = self.status();
        let details = match &self {
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
            AppError::RemoteUnavailable(msg) | AppError::MalformedResponse(msg) => {
                tracing::warn!(error = %msg, "Remote service error");
                Some(Notification::from(&self).message)
            }
            other => Some(Notification::from(other).message),
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
