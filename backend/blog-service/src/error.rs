/// Error types for Blog Service
///
/// Service errors are converted to HTTP responses with a JSON body of the
/// form `{"error": ..., "status": ...}`.
use crate::services::{PostError, UserError};
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::fmt;

/// Result type for blog-service handlers
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Database operation failed
    DatabaseError(String),

    /// A backing store could not be reached or timed out
    ServiceUnavailable(String),

    /// Validation failed
    ValidationError(String),

    /// Resource not found
    NotFound(String),

    /// Unauthorized access
    Unauthorized(String),

    /// Internal server error
    Internal(String),

    /// Conflict (duplicate resource, etc.)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        HttpResponse::build(status).json(serde_json::json!({
            "error": error_msg,
            "status": status.as_u16(),
        }))
    }
}

impl From<PostError> for AppError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Validation(msg) => AppError::ValidationError(msg),
            PostError::NotFound(id) => AppError::NotFound(format!("post {}", id)),
            PostError::Transaction(e) => AppError::ServiceUnavailable(e.to_string()),
            PostError::Persistence(e) => AppError::DatabaseError(e.to_string()),
            other @ (PostError::IndexSync { .. } | PostError::CacheSync { .. }) => {
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Validation(msg) => AppError::ValidationError(msg),
            UserError::NotFound(id) => AppError::NotFound(format!("user {}", id)),
            UserError::Transaction(e) => AppError::ServiceUnavailable(e.to_string()),
            UserError::Persistence(e) => AppError::DatabaseError(e.to_string()),
            UserError::Conflict(msg) => AppError::Conflict(msg),
            UserError::Unauthorized(msg) => AppError::Unauthorized(msg),
            UserError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
