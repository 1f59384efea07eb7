//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::idempotency::IdempotencyError;
use crate::ledger::LedgerStoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Failure categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    BusinessRule,
    Persistence,
    Unknown,
    Auth,
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Idempotency conflict: same key with different request")]
    IdempotencyConflict,

    #[error("Concurrent modification detected, retry the request")]
    ConcurrentModification,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidRequest(_) | AppError::MissingHeader(_) => ErrorKind::Validation,
            AppError::InvalidApiKey => ErrorKind::Auth,
            AppError::AccountNotFound(_) | AppError::PaymentNotFound(_) => ErrorKind::NotFound,
            AppError::IdempotencyConflict => ErrorKind::BusinessRule,
            AppError::ConcurrentModification | AppError::Database(_) => ErrorKind::Persistence,
            AppError::Domain(err) => match err {
                DomainError::Unauthorized(_) => ErrorKind::Auth,
                e if e.is_validation_error() => ErrorKind::Validation,
                e if e.is_not_found() => ErrorKind::NotFound,
                e if e.is_business_rule() => ErrorKind::BusinessRule,
                _ => ErrorKind::Unknown,
            },
            AppError::Internal(_) | AppError::Config(_) => ErrorKind::Unknown,
        }
    }
}

impl From<LedgerStoreError> for AppError {
    fn from(err: LedgerStoreError) -> Self {
        match err {
            LedgerStoreError::SerializationFailure(_) => AppError::ConcurrentModification,
            LedgerStoreError::Database(e) => AppError::Database(e),
            LedgerStoreError::InvalidRow(msg) => AppError::Internal(msg),
        }
    }
}

impl From<IdempotencyError> for AppError {
    fn from(err: IdempotencyError) -> Self {
        match err {
            IdempotencyError::Store(e) => e.into(),
            IdempotencyError::HashMismatch(_) => AppError::IdempotencyConflict,
            IdempotencyError::MissingResponse(key) => {
                AppError::Internal(format!("idempotency key {key} has no stored response"))
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 401 Unauthorized
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key", None),

            // 404 Not Found
            AppError::AccountNotFound(id) => {
                (StatusCode::NOT_FOUND, "account_not_found", Some(id.clone()))
            }
            AppError::PaymentNotFound(id) => {
                (StatusCode::NOT_FOUND, "payment_not_found", Some(id.clone()))
            }

            // 409 Conflict
            AppError::IdempotencyConflict => (StatusCode::CONFLICT, "idempotency_conflict", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => {
                let detail = Some(domain_err.to_string());
                match domain_err {
                    DomainError::InvalidAmount(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_amount", detail)
                    }
                    DomainError::InvalidInstallment { .. } => {
                        (StatusCode::BAD_REQUEST, "invalid_installment", detail)
                    }
                    DomainError::InvalidInstallmentCount(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_installment_count", detail)
                    }
                    DomainError::InvalidRate(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_rate", detail)
                    }
                    DomainError::InstallmentAlreadyPaid { .. } => {
                        (StatusCode::CONFLICT, "installment_already_paid", detail)
                    }
                    DomainError::AlreadyAnnulled { .. } => {
                        (StatusCode::CONFLICT, "already_annulled", detail)
                    }
                    DomainError::ScheduleExhausted { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "schedule_exhausted", detail)
                    }
                    DomainError::PaymentPending { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "payment_pending", detail)
                    }
                    DomainError::AccountPaidOff { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "account_paid_off", detail)
                    }
                    DomainError::PaymentNotFound { .. } => {
                        (StatusCode::NOT_FOUND, "payment_not_found", detail)
                    }
                    DomainError::MissingAccount { .. } => {
                        (StatusCode::NOT_FOUND, "missing_account", detail)
                    }
                    DomainError::Unauthorized(_) => {
                        (StatusCode::UNAUTHORIZED, "unauthorized", detail)
                    }
                }
            }

            // 500 Internal Server Error
            AppError::ConcurrentModification => {
                tracing::error!("Ledger transaction retries exhausted");
                (StatusCode::INTERNAL_SERVER_ERROR, "concurrent_modification", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let error = match self.kind() {
            ErrorKind::Persistence => {
                "A storage error occurred, no changes were applied".to_string()
            }
            ErrorKind::Unknown => "An unexpected error occurred".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
