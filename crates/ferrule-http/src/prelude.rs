//! # Ferrule HTTP Prelude
//!
//! ```rust
//! use ferrule_http::prelude::*;
//! ```

// Router, modules and engines
pub use crate::module::{ContractModule, ModuleConfig};
pub use crate::router::Router;
pub use crate::server::HyperEngine;
pub use crate::{CorsConfig, ServerConfig};

// Middleware
pub use crate::engine::{EngineResponse, ServerEngine};
pub use crate::middleware::{
    AccessLog, HttpMiddleware, JsonBodyParser, MiddlewareError, RequestContext, StaticHeaders,
};

// Contract building blocks
pub use ferrule_contract::prelude::*;

// Error types
pub use crate::{HttpError, Result};
