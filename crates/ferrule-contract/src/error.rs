//! Error taxonomy shared by the binder, the pipeline and every engine
//!
//! - [`ConfigError`]: binding-time, fatal, never reaches a request
//! - [`RequestValidationError`]: request-time, answered with 400 and field-level issues
//! - [`OutputContractViolation`]: request-time handler defect, answered with a generic 500
//! - [`HandlerError`]: raised deliberately by user code

use std::fmt;

use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Binding-time configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("module '{module}' implements unknown operation '{operation}'")]
    UnknownOperation { module: String, operation: String },

    #[error("module '{module}' implements operation '{operation}' more than once")]
    DuplicateImplementation { module: String, operation: String },

    #[error("contract declares operation '{0}' more than once")]
    DuplicateOperation(String),

    #[error("route {method} {path} is already registered (conflicts with {existing})")]
    DuplicateRoute {
        method: Method,
        path: String,
        existing: String,
    },

    #[error("module '{0}' is already registered with a different route set")]
    DuplicateModule(String),

    #[error("invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Which part of the request a validation issue refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueLocation {
    PathParams,
    Query,
    Body,
}

impl fmt::Display for IssueLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathParams => write!(f, "pathParams"),
            Self::Query => write!(f, "query"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// One violated field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub location: IssueLocation,
    /// JSON pointer into the offending value, empty for the value itself
    pub path: String,
    pub message: String,
}

/// Inbound request failed the operation's input schemas
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request validation failed with {} issue(s)", .issues.len())]
pub struct RequestValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl RequestValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// Always 400
    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Structured body enumerating every violated field
    pub fn to_body(&self) -> Value {
        json!({
            "message": "Request validation failed",
            "issues": self.issues,
        })
    }
}

/// Handler result does not fit the operation's declared output mode
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutputContractViolation {
    #[error("detailed result must be a JSON object, got {0}")]
    NotARecord(&'static str),

    #[error("detailed result is missing the 'status' field")]
    MissingStatus,

    #[error("detailed result has an invalid status: {0}")]
    InvalidStatus(Value),

    #[error("detailed result is missing the 'result' field")]
    MissingResult,

    #[error("detailed result has invalid headers: {0}")]
    InvalidHeaders(String),

    #[error("response body does not match the output schema: {0:?}")]
    ResponseSchema(Vec<String>),

    #[error("handler result could not be serialized: {0}")]
    Serialization(String),
}

impl OutputContractViolation {
    /// Output violations are server defects
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Errors raised by user handlers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    /// Deliberate response with an explicit status and body
    #[error("handler responded with status {status}")]
    Status { status: StatusCode, body: Value },

    /// Unexpected failure; the message is logged, never sent to the client
    #[error("handler failed: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(status: StatusCode, body: Value) -> Self {
        Self::Status { status, body }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "message": message.into() }),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::NOT_FOUND,
            body: json!({ "message": message.into() }),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Body returned for every non-validation failure
pub fn generic_failure_body() -> Value {
    json!({ "message": "Internal server error" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_body() {
        let err = RequestValidationError::new(vec![ValidationIssue {
            location: IssueLocation::Body,
            path: "/name".to_string(),
            message: "\"name\" is a required property".to_string(),
        }]);

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = err.to_body();
        assert_eq!(body["message"], "Request validation failed");
        assert_eq!(body["issues"][0]["location"], "body");
        assert_eq!(body["issues"][0]["path"], "/name");
    }

    #[test]
    fn test_issue_location_display_matches_serde() {
        for location in [
            IssueLocation::PathParams,
            IssueLocation::Query,
            IssueLocation::Body,
        ] {
            let serialized = serde_json::to_value(location).unwrap();
            assert_eq!(serialized, json!(location.to_string()));
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnknownOperation {
            module: "greetings".to_string(),
            operation: "goodbye".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "module 'greetings' implements unknown operation 'goodbye'"
        );
    }

    #[test]
    fn test_generic_body_hides_details() {
        let body = generic_failure_body();
        assert_eq!(body, json!({ "message": "Internal server error" }));
    }
}
