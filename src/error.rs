//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for both cache backends and the HTTP layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A required argument was empty or missing
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An expiration value lies outside the accepted range
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// The backend or server does not support the requested command
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Failure reported by the Redis client, passed through unmodified
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// The operation was cancelled before it started
    #[error("Operation cancelled")]
    Cancelled,

    /// Key not found (HTTP layer only, the contract reports misses as `None`)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Lock is held by another owner
    #[error("Lock already held: {0}")]
    LockHeld(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Shorthand for an `InvalidArgument` naming the offending parameter.
    pub fn empty(name: &str) -> Self {
        CacheError::InvalidArgument(format!("{} cannot be empty", name))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidArgument(_) | CacheError::OutOfRange(_) => StatusCode::BAD_REQUEST,
            CacheError::NotSupported(_) => StatusCode::NOT_IMPLEMENTED,
            CacheError::Redis(_) => StatusCode::BAD_GATEWAY,
            CacheError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::LockHeld(_) => StatusCode::CONFLICT,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CacheError::empty("key"), StatusCode::BAD_REQUEST),
            (CacheError::OutOfRange("past".into()), StatusCode::BAD_REQUEST),
            (CacheError::NotSupported("HEXPIRE".into()), StatusCode::NOT_IMPLEMENTED),
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::LockHeld("l".into()), StatusCode::CONFLICT),
            (CacheError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_empty_message() {
        let err = CacheError::empty("pattern");
        assert_eq!(err.to_string(), "Invalid argument: pattern cannot be empty");
    }
}
