//! # Ferrule Contract
//!
//! Engine-independent building blocks for exposing contract-defined remote
//! procedures as HTTP routes. Nothing in this crate knows which HTTP server
//! executes a request; it only describes operations and transforms values.
//!
//! ## Contents
//! - [`ContractOperation`] / [`Contract`]: declarative route, method and schemas
//! - [`Schema`]: the validation boundary (JSON Schema, serde-typed, passthrough)
//! - [`format_output`]: turns a handler result into status + body per [`OutputStructure`]
//! - [`implement`] / [`implement_typed`]: bind user code to a named operation
//! - [`ConfigError`], [`RequestValidationError`], [`OutputContractViolation`],
//!   [`HandlerError`]: the error taxonomy shared by every engine

pub mod contract;
pub mod error;
pub mod handler;
pub mod output;
pub mod path;
pub mod prelude;
pub mod schema;

// Re-export main types
pub use contract::{Contract, ContractBuilder, ContractOperation};
pub use error::{
    ConfigError, HandlerError, IssueLocation, OutputContractViolation, RequestValidationError,
    ValidationIssue, generic_failure_body,
};
pub use handler::{ContractHandler, FnHandler, Implementation, RpcInput, implement, implement_typed};
pub use output::{Detailed, FormattedOutput, OutputStructure, format_output};
pub use path::PathTemplate;
pub use schema::{AnySchema, JsonSchema, Schema, SchemaIssue, TypedSchema};

/// Result type for contract configuration
pub type Result<T> = std::result::Result<T, ConfigError>;
