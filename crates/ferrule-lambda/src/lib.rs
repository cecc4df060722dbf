//! AWS Lambda engine for ferrule
//!
//! Serves the same [`ferrule_http::Router`] the hyper engine serves, so routes,
//! middleware, CORS and the contract pipeline behave identically under Lambda.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrule_http::{Router, ServerConfig, ServerEngine};
//! use ferrule_lambda::LambdaEngine;
//! use lambda_http::{run, service_fn, Error};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let router = Router::new(ServerConfig::default());
//!     // register contract modules on `router` here
//!
//!     let engine = LambdaEngine::new(router);
//!     engine.ready().await?;
//!
//!     run(service_fn(move |req| {
//!         let engine = engine.clone();
//!         async move { engine.handle(req).await.map_err(Error::from) }
//!     }))
//!     .await
//! }
//! ```

pub mod adapter;
pub mod engine;
pub mod error;

/// Request/response adapters over `lambda_http` types
pub use adapter::{LambdaRequestAdapter, LambdaResponseWriter};
/// Engine that must be awaited ready before serving
pub use engine::LambdaEngine;
/// Lambda-specific error types and result aliases
pub use error::{LambdaError, Result};
