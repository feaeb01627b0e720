//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{DomainError, ValidationError};

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Domain(DomainError::Validation(e))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    /// Status, machine-readable code and optional details
    fn classify(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            AppError::Domain(domain_err) => match domain_err {
                // 400 Bad Request
                DomainError::Validation(e) => {
                    (StatusCode::BAD_REQUEST, "validation_error", Some(e.field.clone()))
                }
                DomainError::InsufficientFunds { account_no } => {
                    (StatusCode::BAD_REQUEST, "insufficient_funds", Some(account_no.clone()))
                }

                // 404 Not Found
                DomainError::AccountNotFound(id) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(id.clone()))
                }
                DomainError::EnvelopeNotFound(id) => {
                    (StatusCode::NOT_FOUND, "envelope_not_found", Some(id.clone()))
                }

                // 409 Conflict
                DomainError::Depleted { envelope_no } => {
                    (StatusCode::CONFLICT, "envelope_depleted", Some(envelope_no.clone()))
                }
                DomainError::EnvelopeExpired(id) => {
                    (StatusCode::CONFLICT, "envelope_expired", Some(id.clone()))
                }
                DomainError::DuplicateAccount { user_id, .. } => {
                    (StatusCode::CONFLICT, "duplicate_account", Some(user_id.clone()))
                }

                // 500 Internal Server Error
                DomainError::Persistence(msg) => {
                    tracing::error!("Persistence error: {}", msg);
                    (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", None)
                }
                DomainError::InvariantViolation(msg) => {
                    tracing::error!("Invariant violation: {}", msg);
                    (StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation", None)
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.classify();

        // Internal messages stay in the logs
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
