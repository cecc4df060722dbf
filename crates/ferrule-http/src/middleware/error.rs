//! Errors that end a request inside the middleware chain

use http::StatusCode;
use serde_json::{Value, json};

/// Rejection raised by `before_dispatch`
///
/// The router turns it into a response without ever reaching a route.
/// `Internal` is logged and answered with the generic failure body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MiddlewareError {
    /// 401
    #[error("Missing credentials: {0}")]
    Unauthenticated(String),

    /// 403
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 429; `retry_after` becomes a `Retry-After` header
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    /// 400
    #[error("Bad request: {0}")]
    InvalidRequest(String),

    /// 500
    #[error("middleware failed: {0}")]
    Internal(String),

    #[error("{message}")]
    Status { status: StatusCode, message: String },
}

impl MiddlewareError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Status { status, .. } => *status,
        }
    }

    /// Response body; `Internal` never leaks its message
    pub fn to_body(&self) -> Value {
        if matches!(self, Self::Internal(_)) {
            return ferrule_contract::generic_failure_body();
        }
        json!({ "message": self.to_string() })
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses() {
        let cases = [
            (MiddlewareError::unauthenticated("no key"), 401),
            (MiddlewareError::forbidden("tenant mismatch"), 403),
            (MiddlewareError::rate_limited("slow down", None), 429),
            (MiddlewareError::invalid_request("bad header"), 400),
            (MiddlewareError::internal("store offline"), 500),
            (MiddlewareError::with_status(StatusCode::IM_A_TEAPOT, "tea"), 418),
        ];
        for (err, status) in cases {
            assert_eq!(err.status().as_u16(), status, "{:?}", err);
        }
    }

    #[test]
    fn test_rate_limit_carries_retry_after_outside_message() {
        let err = MiddlewareError::rate_limited("Slow down", Some(30));
        assert_eq!(err.retry_after(), Some(30));
        assert_eq!(err.to_body(), json!({ "message": "Slow down" }));

        assert_eq!(MiddlewareError::forbidden("x").retry_after(), None);
    }

    #[test]
    fn test_internal_message_is_withheld() {
        let err = MiddlewareError::internal("redis at 10.0.0.7 refused connection");
        assert_eq!(err.to_body(), ferrule_contract::generic_failure_body());
        assert!(err.to_string().contains("10.0.0.7"));

        let body = MiddlewareError::invalid_request("Malformed JSON body: EOF").to_body();
        assert_eq!(body["message"], "Bad request: Malformed JSON body: EOF");
    }
}
