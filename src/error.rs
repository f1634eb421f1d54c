//! Application-wide error taxonomy (spec §7).
//! Mission: collapse the many domain-specific error enums into one tagged
//! kind plus a free-form message, the way `auth::api::AuthApiError` maps a
//! closed set of variants onto HTTP statuses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Abstract error kind from spec §7. Every handler-facing error is tagged
/// with exactly one of these; the message and context carry the specifics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    AuthFailure,
    DomainStateError,
    TransientInfrastructure,
    Unexpected,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::AuthFailure => StatusCode::UNAUTHORIZED,
            ErrorKind::DomainStateError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::TransientInfrastructure => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The single error type returned by HTTP handlers across every service.
#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub retry_after: Option<u64>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthFailure, message)
    }

    pub fn domain_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DomainStateError, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientInfrastructure, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: "Too many requests".to_string(),
            retry_after: Some(retry_after_secs),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // TooManyRequests is the one case whose status doesn't follow
        // directly from ErrorKind (it shares Validation's "bad request"
        // family but needs its own status + Retry-After header).
        let status = if self.retry_after.is_some() {
            StatusCode::TOO_MANY_REQUESTS
        } else {
            self.kind.status()
        };

        let body = Json(json!({
            "error": format!("{:?}", self.kind),
            "message": self.message,
        }));

        match self.retry_after {
            Some(secs) => {
                (status, [("Retry-After", secs.to_string())], body).into_response()
            }
            None => (status, body).into_response(),
        }
    }
}

/// Lower-level domain error returned by aggregate methods that don't talk to
/// axum at all (`Order`, `Money`, …). Converted to `AppError` at the service
/// boundary.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("illegal state transition: {0}")]
    IllegalTransition(String),
    #[error("currency mismatch: {0} vs {1}")]
    CurrencyMismatch(String, String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid isbn: {0}")]
    InvalidIsbn(String),
    #[error("invalid postal code: {0}")]
    InvalidPostalCode(String),
    #[error("empty cart")]
    EmptyCart,
    #[error("session expired")]
    SessionExpired,
    #[error("payment declined: {0}")]
    PaymentDeclined(String),
    #[error("concurrency conflict on {0}")]
    ConcurrencyConflict(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::EmptyCart => AppError::validation(err.to_string()),
            DomainError::SessionExpired => {
                AppError::new(ErrorKind::DomainStateError, err.to_string())
            }
            DomainError::PaymentDeclined(_) => {
                AppError::new(ErrorKind::DomainStateError, err.to_string())
            }
            DomainError::ConcurrencyConflict(_) => AppError::conflict(err.to_string()),
            DomainError::IllegalTransition(_)
            | DomainError::CurrencyMismatch(_, _)
            | DomainError::InvalidAmount(_)
            | DomainError::InvalidIsbn(_)
            | DomainError::InvalidPostalCode(_) => AppError::domain_state(err.to_string()),
        }
    }
}
