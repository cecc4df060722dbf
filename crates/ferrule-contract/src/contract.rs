//! Contract operations and contracts
//!
//! A [`ContractOperation`] is immutable once built and is shared read-only as
//! `Arc<ContractOperation>` by every module that implements it.

use std::collections::BTreeMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ConfigError;
use crate::output::OutputStructure;
use crate::path::PathTemplate;
use crate::schema::Schema;

/// One RPC endpoint: route, method, schemas and output policy
#[derive(Debug, Clone)]
pub struct ContractOperation {
    method: Method,
    path: PathTemplate,
    path_params: Option<Arc<dyn Schema>>,
    query: Option<Arc<dyn Schema>>,
    body: Option<Arc<dyn Schema>>,
    output: Option<Arc<dyn Schema>>,
    output_structure: Option<OutputStructure>,
    success_status: StatusCode,
    summary: Option<String>,
}

impl ContractOperation {
    /// Start an operation; the path is parsed immediately
    pub fn new(method: Method, path: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            method,
            path: PathTemplate::parse(path)?,
            path_params: None,
            query: None,
            body: None,
            output: None,
            output_structure: None,
            success_status: StatusCode::OK,
            summary: None,
        })
    }

    pub fn get(path: &str) -> Result<Self, ConfigError> {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Result<Self, ConfigError> {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Result<Self, ConfigError> {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: &str) -> Result<Self, ConfigError> {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &str) -> Result<Self, ConfigError> {
        Self::new(Method::DELETE, path)
    }

    /// Schema for the JSON request body
    pub fn body(mut self, schema: impl Schema + 'static) -> Self {
        self.body = Some(Arc::new(schema));
        self
    }

    /// Schema for the decoded query string object
    pub fn query(mut self, schema: impl Schema + 'static) -> Self {
        self.query = Some(Arc::new(schema));
        self
    }

    /// Schema for the path parameter object
    pub fn path_params(mut self, schema: impl Schema + 'static) -> Self {
        self.path_params = Some(Arc::new(schema));
        self
    }

    /// Schema for successful response bodies
    pub fn output(mut self, schema: impl Schema + 'static) -> Self {
        self.output = Some(Arc::new(schema));
        self
    }

    /// Override the module-level output structure for this operation
    pub fn output_structure(mut self, structure: OutputStructure) -> Self {
        self.output_structure = Some(structure);
        self
    }

    /// Status used by `raw` responses (200 unless declared)
    pub fn success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &PathTemplate {
        &self.path
    }

    pub fn body_schema(&self) -> Option<&dyn Schema> {
        self.body.as_deref()
    }

    pub fn query_schema(&self) -> Option<&dyn Schema> {
        self.query.as_deref()
    }

    pub fn path_params_schema(&self) -> Option<&dyn Schema> {
        self.path_params.as_deref()
    }

    pub fn output_schema(&self) -> Option<&dyn Schema> {
        self.output.as_deref()
    }

    /// Per-operation override, if declared
    pub fn declared_output_structure(&self) -> Option<OutputStructure> {
        self.output_structure
    }

    /// Override if declared, otherwise the module default
    pub fn effective_output_structure(&self, module_default: OutputStructure) -> OutputStructure {
        self.output_structure.unwrap_or(module_default)
    }

    pub fn default_success_status(&self) -> StatusCode {
        self.success_status
    }

    pub fn description(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    fn document(&self, name: &str) -> Value {
        let describe = |schema: Option<&dyn Schema>| schema.and_then(|s| s.json_schema());
        json!({
            "name": name,
            "method": self.method.as_str(),
            "path": self.path.as_str(),
            "summary": self.summary,
            "successStatus": self.success_status.as_u16(),
            "outputStructure": self.output_structure,
            "pathParams": describe(self.path_params_schema()),
            "query": describe(self.query_schema()),
            "body": describe(self.body_schema()),
            "output": describe(self.output_schema()),
        })
    }
}

/// Named set of operations
#[derive(Debug, Clone, Default)]
pub struct Contract {
    operations: BTreeMap<String, Arc<ContractOperation>>,
}

impl Contract {
    pub fn builder() -> ContractBuilder {
        ContractBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ContractOperation>> {
        self.operations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Operations ordered by name
    pub fn operations(&self) -> impl Iterator<Item = (&str, &Arc<ContractOperation>)> {
        self.operations.iter().map(|(name, op)| (name.as_str(), op))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Machine-readable listing of every operation and its self-describing schemas
    pub fn document(&self) -> Value {
        Value::Array(
            self.operations
                .iter()
                .map(|(name, op)| op.document(name))
                .collect(),
        )
    }
}

/// Builder for [`Contract`]
#[derive(Debug, Default)]
pub struct ContractBuilder {
    operations: Vec<(String, ContractOperation)>,
}

impl ContractBuilder {
    pub fn operation(mut self, name: impl Into<String>, operation: ContractOperation) -> Self {
        self.operations.push((name.into(), operation));
        self
    }

    /// Rejects duplicate names and operations whose routes overlap
    pub fn build(self) -> Result<Contract, ConfigError> {
        let mut operations: BTreeMap<String, Arc<ContractOperation>> = BTreeMap::new();

        for (name, operation) in self.operations {
            if operations.contains_key(&name) {
                return Err(ConfigError::DuplicateOperation(name));
            }
            if let Some((existing, _)) = operations.iter().find(|(_, op)| {
                op.method == operation.method && op.path.conflicts_with(&operation.path)
            }) {
                return Err(ConfigError::DuplicateRoute {
                    method: operation.method.clone(),
                    path: operation.path.to_string(),
                    existing: existing.clone(),
                });
            }
            debug!("Contract operation '{}': {} {}", name, operation.method, operation.path);
            operations.insert(name, Arc::new(operation));
        }

        Ok(Contract { operations })
    }
}
