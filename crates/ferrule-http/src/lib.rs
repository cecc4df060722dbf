//! # Ferrule HTTP
//!
//! Hosts contract operations as routes inside a router that keeps its own
//! request pipeline: CORS injection, ordered middleware and per-route
//! method/path dispatch. The router never depends on a concrete server; engines
//! plug in through the capability traits in [`engine`].
//!
//! ## Engines
//! - **hyper** ([`HyperEngine`]): ready as soon as it is constructed
//! - **Lambda** (`ferrule-lambda`): must be awaited ready before serving
//!
//! ## Flow
//! 1. The engine wraps its native request/response in adapters
//! 2. [`Router::dispatch`] applies CORS and runs middleware
//! 3. The matched [`HandlerBinding`] runs the [`pipeline`]: normalize,
//!    validate, handle, format, write
//! 4. After-dispatch middleware runs, then the engine finishes the response

pub mod config;
pub mod cors;
pub mod engine;
pub mod middleware;
pub mod module;
pub mod normalize;
pub mod pipeline;
pub mod prelude;
pub mod router;
pub mod server;

#[cfg(test)]
mod tests;

// Re-export main types
pub use config::ServerConfig;
pub use cors::CorsConfig;
pub use engine::{EngineRequest, EngineResponse, ServerEngine, TransportError, write_json};
pub use middleware::{HttpMiddleware, MiddlewareError, MiddlewareStack, RequestContext};
pub use module::{ContractModule, ContractModuleBuilder, HandlerBinding, ModuleConfig};
pub use normalize::NormalizedRequest;
pub use pipeline::{PipelineError, PipelineStage};
pub use router::{RouteError, RouteHandler, RouteRequest, RouteSignature, Router};
pub use server::{HyperEngine, HyperRequest, HyperResponse};

// Re-export foundational types
pub use ferrule_contract;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// Server-level errors
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Configuration error: {0}")]
    Config(#[from] ferrule_contract::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("CORS configuration error: {0}")]
    Cors(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
