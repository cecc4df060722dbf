//! Handler invocation pipeline
//!
//! ```text
//! Received -> Normalized -> Validated -> Handled -> Formatted -> Written
//! ```
//!
//! Any stage may short-circuit to an error response. Headers set on the
//! response before the pipeline runs (CORS, middleware) are never removed.

use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use http::header::{self, HeaderValue};
use serde_json::{Map, Value};
use tracing::{debug, error, trace, warn};

use ferrule_contract::{
    ContractOperation, FormattedOutput, HandlerError, IssueLocation, OutputContractViolation,
    RequestValidationError, RpcInput, Schema, ValidationIssue, format_output,
    generic_failure_body,
};

use crate::engine::{EngineResponse, TransportError, write_json};
use crate::module::HandlerBinding;
use crate::normalize::{NormalizedRequest, normalize};
use crate::router::{RouteError, RouteRequest};

/// Where a request is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Normalized,
    Validated,
    Handled,
    Formatted,
    Written,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Normalized => "normalized",
            Self::Validated => "validated",
            Self::Handled => "handled",
            Self::Formatted => "formatted",
            Self::Written => "written",
        };
        f.write_str(name)
    }
}

/// Failures that end the pipeline with an error response
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("request validation failed: {} issue(s)", .0.issues.len())]
    Validation(RequestValidationError),

    #[error(transparent)]
    Handler(HandlerError),

    #[error("output contract violated: {0}")]
    OutputContract(OutputContractViolation),
}

impl PipelineError {
    /// Status and client-facing body
    ///
    /// Only validation failures and deliberate handler statuses carry detail;
    /// everything else gets the generic failure body.
    pub fn to_response(&self) -> (StatusCode, Value) {
        match self {
            Self::Validation(err) => (err.status(), err.to_body()),
            Self::Handler(HandlerError::Status { status, body }) => (*status, body.clone()),
            Self::Handler(HandlerError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, generic_failure_body())
            }
            Self::OutputContract(violation) => (violation.status(), generic_failure_body()),
        }
    }
}

/// Run a matched request through the pipeline of `binding`
pub async fn run(
    binding: &HandlerBinding,
    request: RouteRequest<'_>,
    response: &mut dyn EngineResponse,
) -> Result<(), RouteError> {
    let RouteRequest {
        request,
        path_params,
        metadata,
    } = request;
    let cancellation = request.cancellation();
    let mut stage = PipelineStage::Received;
    trace!("{} {}", binding.name(), stage);

    let normalized = normalize(request, path_params).await?;
    stage = PipelineStage::Normalized;
    trace!("{} {}", binding.name(), stage);

    let input = match validate(binding.operation(), normalized, metadata) {
        Ok(input) => input,
        Err(err) => {
            debug!("Rejected input for '{}': {:?}", binding.name(), err.issues);
            return write_error(response, &PipelineError::Validation(err));
        }
    };
    stage = PipelineStage::Validated;
    trace!("{} {}", binding.name(), stage);

    let outcome = tokio::select! {
        biased;
        _ = cancellation.cancelled() => {
            debug!("'{}' cancelled during handler execution", binding.name());
            return Err(RouteError::Cancelled);
        }
        outcome = binding.handler().handle(input) => outcome,
    };
    stage = PipelineStage::Handled;
    trace!("{} {}", binding.name(), stage);

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            if let HandlerError::Internal(msg) = &err {
                error!("Handler '{}' failed: {}", binding.name(), msg);
            }
            return write_error(response, &PipelineError::Handler(err));
        }
    };

    let formatted = match format_output(
        result,
        binding.output_structure(),
        binding.operation().default_success_status(),
    ) {
        Ok(formatted) => formatted,
        Err(violation) => {
            error!("Handler '{}' violated its output contract: {}", binding.name(), violation);
            return write_error(response, &PipelineError::OutputContract(violation));
        }
    };

    if binding.validates_responses() && formatted.status.is_success() {
        if let Some(schema) = binding.operation().output_schema() {
            if let Err(issues) = schema.validate(&formatted.body) {
                let messages = issues
                    .iter()
                    .map(|issue| format!("{}: {}", issue.path, issue.message))
                    .collect();
                let violation = OutputContractViolation::ResponseSchema(messages);
                error!("Handler '{}' violated its output contract: {}", binding.name(), violation);
                return write_error(response, &PipelineError::OutputContract(violation));
            }
        }
    }
    stage = PipelineStage::Formatted;
    trace!("{} {}", binding.name(), stage);

    if cancellation.is_cancelled() {
        return Err(RouteError::Cancelled);
    }

    write_formatted(response, formatted)?;
    stage = PipelineStage::Written;
    trace!("{} {}", binding.name(), stage);
    Ok(())
}

/// Validate path params, then query, then body, collecting every issue
fn validate(
    operation: &ContractOperation,
    normalized: NormalizedRequest,
    metadata: Map<String, Value>,
) -> Result<RpcInput, RequestValidationError> {
    let NormalizedRequest {
        method,
        path,
        path_params,
        query,
        headers,
        body,
    } = normalized;
    let mut issues = Vec::new();

    let path_params = validate_map(
        operation.path_params_schema(),
        path_params,
        IssueLocation::PathParams,
        &mut issues,
    );
    let query = validate_map(
        operation.query_schema(),
        query,
        IssueLocation::Query,
        &mut issues,
    );
    let body = match operation.body_schema() {
        None => body,
        Some(schema) => match schema.validate(&body) {
            Ok(value) => value,
            Err(errors) => {
                issues.extend(into_issues(IssueLocation::Body, errors));
                body
            }
        },
    };

    if !issues.is_empty() {
        return Err(RequestValidationError::new(issues));
    }

    Ok(RpcInput {
        method,
        path,
        path_params,
        query,
        headers,
        body,
        metadata,
    })
}

fn validate_map(
    schema: Option<&dyn Schema>,
    values: Map<String, Value>,
    location: IssueLocation,
    issues: &mut Vec<ValidationIssue>,
) -> Map<String, Value> {
    let Some(schema) = schema else {
        return values;
    };

    let values = Value::Object(values);
    match schema.validate(&values) {
        Ok(Value::Object(parsed)) => parsed,
        Ok(_) => match values {
            Value::Object(original) => original,
            _ => Map::new(),
        },
        Err(errors) => {
            issues.extend(into_issues(location, errors));
            Map::new()
        }
    }
}

fn into_issues(
    location: IssueLocation,
    errors: Vec<ferrule_contract::SchemaIssue>,
) -> impl Iterator<Item = ValidationIssue> {
    errors.into_iter().map(move |issue| ValidationIssue {
        location,
        path: issue.path,
        message: issue.message,
    })
}

fn write_error(
    response: &mut dyn EngineResponse,
    err: &PipelineError,
) -> Result<(), RouteError> {
    if response.is_closed() {
        return Err(RouteError::Cancelled);
    }
    let (status, body) = err.to_response();
    write_json(response, status, &body)?;
    Ok(())
}

/// Write a formatted result, keeping headers that upstream layers already set
fn write_formatted(
    response: &mut dyn EngineResponse,
    formatted: FormattedOutput,
) -> Result<(), TransportError> {
    let FormattedOutput {
        status,
        body,
        headers,
    } = formatted;

    for name in headers.keys() {
        if name == header::CONTENT_TYPE {
            response.headers_mut().remove(name);
        } else if response.headers().contains_key(name) {
            warn!("Ignoring handler header '{}' already set upstream", name);
            continue;
        }
        for value in headers.get_all(name) {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }

    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return write_json(response, status, &Value::Null);
    }

    match body {
        // A handler-chosen non-JSON content type gets the string verbatim
        Value::String(text)
            if response
                .headers()
                .get(header::CONTENT_TYPE)
                .is_some_and(|ct| !is_json_content_type(ct)) =>
        {
            response.set_status(status)?;
            response.write_body(Bytes::from(text))
        }
        body => write_json(response, status, &body),
    }
}

fn is_json_content_type(value: &HeaderValue) -> bool {
    value
        .to_str()
        .map(|ct| {
            let mime = ct.split(';').next().unwrap_or_default().trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_contract::{ContractOperation, JsonSchema};
    use serde_json::json;

    fn operation() -> ContractOperation {
        ContractOperation::get("/users/:id")
            .unwrap()
            .path_params(
                JsonSchema::new(json!({
                    "type": "object",
                    "properties": { "id": { "type": "string", "pattern": "^[0-9]+$" } }
                }))
                .unwrap(),
            )
            .query(
                JsonSchema::new(json!({
                    "type": "object",
                    "required": ["verbose"]
                }))
                .unwrap(),
            )
    }

    fn normalized(id: &str, query: Map<String, Value>) -> NormalizedRequest {
        let mut path_params = Map::new();
        path_params.insert("id".to_string(), json!(id));
        NormalizedRequest {
            method: http::Method::GET,
            path: format!("/users/{}", id),
            path_params,
            query,
            headers: http::HeaderMap::new(),
            body: Value::Null,
        }
    }

    #[test]
    fn test_validate_collects_issues_in_order() {
        let err = validate(&operation(), normalized("abc", Map::new()), Map::new()).unwrap_err();

        let locations: Vec<_> = err.issues.iter().map(|i| i.location).collect();
        assert_eq!(locations, vec![IssueLocation::PathParams, IssueLocation::Query]);
    }

    #[test]
    fn test_validate_passes_metadata_through() {
        let mut query = Map::new();
        query.insert("verbose".to_string(), json!("true"));
        let mut metadata = Map::new();
        metadata.insert("tenant".to_string(), json!("acme"));

        let input = validate(&operation(), normalized("42", query), metadata).unwrap();
        assert_eq!(input.path_param("id"), Some("42"));
        assert_eq!(input.query["verbose"], "true");
        assert_eq!(input.metadata["tenant"], "acme");
    }

    #[test]
    fn test_error_responses() {
        let (status, body) =
            PipelineError::Handler(HandlerError::internal("secret detail")).to_response();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, generic_failure_body());

        let (status, body) =
            PipelineError::OutputContract(OutputContractViolation::MissingStatus).to_response();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, generic_failure_body());

        let (status, body) =
            PipelineError::Handler(HandlerError::not_found("no such user")).to_response();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "no such user");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Received.to_string(), "received");
        assert_eq!(PipelineStage::Written.to_string(), "written");
    }
}
