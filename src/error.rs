//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::handlers::{ErrorKind, HandlerError};

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn handler_status(err: &HandlerError) -> (StatusCode, &'static str, Option<String>) {
    let kind = err.kind();

    if kind == ErrorKind::Inconsistency {
        tracing::error!(error = %err, "Ledger left inconsistent, manual reconciliation required");
        return (StatusCode::INTERNAL_SERVER_ERROR, "ledger_inconsistent", None);
    }
    if err.is_cancelled() {
        return (StatusCode::SERVICE_UNAVAILABLE, "cancelled", None);
    }
    if err.store_error().is_some_and(|e| e.is_duplicate()) {
        return (StatusCode::CONFLICT, "duplicate", None);
    }

    match (kind, err) {
        (ErrorKind::Client, HandlerError::LackOfCurrency { .. }) => {
            (StatusCode::FORBIDDEN, "lack_of_currency", None)
        }
        (ErrorKind::Client, HandlerError::InvalidRequest(msg)) => {
            (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
        }
        (ErrorKind::Client, _) => (StatusCode::BAD_REQUEST, "invalid_request", None),
        (ErrorKind::Lookup, _) => (StatusCode::NOT_FOUND, "not_found", None),
        _ => {
            tracing::error!(error = %err, "Handler error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            AppError::Handler(err) => handler_status(err),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
