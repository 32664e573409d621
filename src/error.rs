use actix_web::{error, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::services::StoreError;

/// Errors surfaced by the discovery and matching engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Profile incomplete: {0}")]
    ProfileIncomplete(String),

    /// Lost a race on a uniqueness constraint; retried internally
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Dependency failure: {0}")]
    DependencyFailure(String),

    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl EngineError {
    /// Machine readable error code used in the JSON body
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidAction(_) => "invalid_action",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::ProfileIncomplete(_) => "profile_incomplete",
            EngineError::Conflict(_) => "conflict",
            EngineError::DependencyFailure(_) => "dependency_failure",
            EngineError::Timeout(_) => "timeout",
            EngineError::Unauthorized(_) => "unauthorized",
        }
    }

    /// Whether a caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::DependencyFailure(_) | EngineError::Timeout(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::Conflict(what) => EngineError::Conflict(what),
            StoreError::InvalidInput(what) => EngineError::InvalidAction(what),
            other => EngineError::DependencyFailure(other.to_string()),
        }
    }
}

impl error::ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidAction(_) => StatusCode::BAD_REQUEST,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::ProfileIncomplete(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::DependencyFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EngineError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}
