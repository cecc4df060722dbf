//! # Ferrule Contract Prelude
//!
//! ```rust
//! use ferrule_contract::prelude::*;
//! ```

pub use crate::contract::{Contract, ContractOperation};
pub use crate::error::{ConfigError, HandlerError, OutputContractViolation, RequestValidationError};
pub use crate::handler::{ContractHandler, Implementation, RpcInput, implement, implement_typed};
pub use crate::output::{Detailed, OutputStructure};
pub use crate::schema::{AnySchema, JsonSchema, Schema, TypedSchema};
