//! Schema boundary
//!
//! Validation semantics belong to the schema library; the adapter consumes only
//! pass/fail and the parsed output. A successful validation may reshape the
//! value (for example [`TypedSchema`] drops unknown fields), and the reshaped
//! value is what the handler receives.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ConfigError;

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// JSON pointer into the validated value, empty for the root
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Opaque validator attached to a contract operation
pub trait Schema: Send + Sync + fmt::Debug {
    /// Validate `value`, returning the parsed output or every violation found
    fn validate(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>>;

    /// JSON Schema document describing accepted values, when known
    fn json_schema(&self) -> Option<Value> {
        None
    }
}

/// Compiled JSON Schema document
pub struct JsonSchema {
    document: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compile a schema document; an invalid document is a configuration error
    pub fn new(document: Value) -> Result<Self, ConfigError> {
        let validator = jsonschema::validator_for(&document)
            .map_err(|e| ConfigError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            document,
            validator,
        })
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("document", &self.document)
            .finish()
    }
}

impl Schema for JsonSchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
        let issues: Vec<SchemaIssue> = self
            .validator
            .iter_errors(value)
            .map(|error| SchemaIssue::new(error.instance_path.to_string(), error.to_string()))
            .collect();

        if issues.is_empty() {
            Ok(value.clone())
        } else {
            Err(issues)
        }
    }

    fn json_schema(&self) -> Option<Value> {
        Some(self.document.clone())
    }
}

/// Schema backed by a Rust type
///
/// Validation is deserialization into `T`; the output is `T` serialized back,
/// so the handler sees the normalized shape.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedSchema<{}>", std::any::type_name::<T>())
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + schemars::JsonSchema,
{
    fn validate(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
        let parsed: T = serde_json::from_value(value.clone())
            .map_err(|e| vec![SchemaIssue::new("", e.to_string())])?;
        serde_json::to_value(parsed).map_err(|e| vec![SchemaIssue::new("", e.to_string())])
    }

    fn json_schema(&self) -> Option<Value> {
        Some(schemars::schema_for!(T).as_value().clone())
    }
}

/// Accepts every value unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct AnySchema;

impl Schema for AnySchema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<SchemaIssue>> {
        Ok(value.clone())
    }
}
