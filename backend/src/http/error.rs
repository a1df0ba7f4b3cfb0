//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::api::{CounterViolation, MonotonicValidationError};
use crate::db::repository::RepositoryError;
use crate::db::services::{repository_code, UtilizationError};

/// One offending counter in an error body.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationBody {
    #[serde(flatten)]
    pub violation: CounterViolation,
    pub message: String,
}

impl From<CounterViolation> for ViolationBody {
    fn from(violation: CounterViolation) -> Self {
        let message = violation.message();
        Self { violation, message }
    }
}

/// API error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Every counter that went backwards, for monotonicity failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<ViolationBody>>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            violations: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_violations(mut self, violations: Vec<CounterViolation>) -> Self {
        self.violations = Some(violations.into_iter().map(ViolationBody::from).collect());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Invalid request (validation error)
    BadRequest(String),
    /// Snapshot already recorded for that aircraft and day
    Conflict(String),
    /// Counters would go backwards
    Monotonic(MonotonicValidationError),
    /// A fleet total does not fit the counter range
    Overflow(String),
    /// Internal server error
    Internal(String),
    /// Repository error
    Repository(RepositoryError),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ApiError) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("INVALID_INPUT", msg))
            }
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ApiError::new("DUPLICATE_SNAPSHOT", msg),
            ),
            AppError::Monotonic(err) => {
                let message = err.to_string();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ApiError::new("MONOTONIC_VIOLATION", message)
                        .with_violations(err.violations),
                )
            }
            AppError::Overflow(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::new("COUNTER_OVERFLOW", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Repository(e) => {
                let status = if e.is_not_found() {
                    StatusCode::NOT_FOUND
                } else if e.is_conflict() {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                let mut body = ApiError::new(repository_code(&e), e.to_string());
                if let Some(operation) = e.context().operation.as_ref() {
                    body = body.with_details(format!("operation: {}", operation));
                }
                (status, body)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(code = %error.code, "{}", error.message);
        }
        (status, Json(error)).into_response()
    }
}

impl From<UtilizationError> for AppError {
    fn from(err: UtilizationError) -> Self {
        match err {
            UtilizationError::DuplicateSnapshot { .. } => AppError::Conflict(err.to_string()),
            UtilizationError::MonotonicViolation(v) => AppError::Monotonic(v),
            UtilizationError::NotFound(msg) => AppError::NotFound(msg),
            UtilizationError::InvalidInput(msg) => AppError::BadRequest(msg),
            UtilizationError::CounterOverflow(e) => AppError::Overflow(e.to_string()),
            UtilizationError::Repository(e) => AppError::Repository(e),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
