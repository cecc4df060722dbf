//! Output formatting
//!
//! Converts a handler result into the status, body and extra headers that the
//! pipeline writes. Pure: nothing here touches a transport.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OutputContractViolation;

/// How a handler result maps onto the HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStructure {
    /// The result is the body; the status is the operation's success status
    #[default]
    Raw,
    /// The result is `{"status": .., "result": .., "headers"?: {..}}`
    Detailed,
}

impl std::str::FromStr for OutputStructure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "detailed" => Ok(Self::Detailed),
            other => Err(format!("unknown output structure '{}'", other)),
        }
    }
}

/// Final status, body and additional headers for one response
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedOutput {
    pub status: StatusCode,
    pub body: Value,
    pub headers: HeaderMap,
}

/// Record returned by handlers of `detailed` operations
///
/// ```
/// # use ferrule_contract::Detailed;
/// # use serde_json::json;
/// let record = serde_json::to_value(Detailed::new(201, json!({"id": 1}))).unwrap();
/// assert_eq!(record, json!({"status": 201, "result": {"id": 1}}));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detailed<T> {
    pub status: u16,
    pub result: T,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,
}

impl<T> Detailed<T> {
    pub fn new(status: u16, result: T) -> Self {
        Self {
            status,
            result,
            headers: Map::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Value::String(value.into()));
        self
    }
}

/// Format a handler result according to its operation's output structure
///
/// In `detailed` mode a missing, non-integer or out-of-range status is a
/// violation; it never falls back to `default_status`.
pub fn format_output(
    result: Value,
    structure: OutputStructure,
    default_status: StatusCode,
) -> Result<FormattedOutput, OutputContractViolation> {
    match structure {
        OutputStructure::Raw => Ok(FormattedOutput {
            status: default_status,
            body: result,
            headers: HeaderMap::new(),
        }),
        OutputStructure::Detailed => format_detailed(result),
    }
}

fn format_detailed(result: Value) -> Result<FormattedOutput, OutputContractViolation> {
    let mut record = match result {
        Value::Object(record) => record,
        other => return Err(OutputContractViolation::NotARecord(json_kind(&other))),
    };

    let status = match record.remove("status") {
        None => return Err(OutputContractViolation::MissingStatus),
        Some(value) => parse_status(&value).ok_or(OutputContractViolation::InvalidStatus(value))?,
    };

    let body = record
        .remove("result")
        .ok_or(OutputContractViolation::MissingResult)?;

    let headers = match record.remove("headers") {
        None | Some(Value::Null) => HeaderMap::new(),
        Some(Value::Object(entries)) => parse_headers(entries)?,
        Some(other) => {
            return Err(OutputContractViolation::InvalidHeaders(format!(
                "expected an object, got {}",
                json_kind(&other)
            )));
        }
    };

    Ok(FormattedOutput {
        status,
        body,
        headers,
    })
}

fn parse_status(value: &Value) -> Option<StatusCode> {
    let code = value.as_u64()?;
    let code = u16::try_from(code).ok()?;
    // 1xx is never a final response status
    if !(200..=599).contains(&code) {
        return None;
    }
    StatusCode::from_u16(code).ok()
}

fn parse_headers(entries: Map<String, Value>) -> Result<HeaderMap, OutputContractViolation> {
    let mut headers = HeaderMap::new();
    for (name, value) in entries {
        let Value::String(value) = value else {
            return Err(OutputContractViolation::InvalidHeaders(format!(
                "header '{}' must be a string",
                name
            )));
        };
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| OutputContractViolation::InvalidHeaders(e.to_string()))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| OutputContractViolation::InvalidHeaders(e.to_string()))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
