//! Router middleware
//!
//! Layers see the engine-neutral request and response, so one layer behaves
//! the same under hyper and under Lambda. [`MiddlewareStack`] walks the
//! [`HttpMiddleware`] hooks in order; [`RequestContext`] carries metadata on
//! to handlers. Stock layers live in [`builtins`].
//!
//! ```rust,no_run
//! use ferrule_http::middleware::{HttpMiddleware, RequestContext, MiddlewareError};
//! use ferrule_http::engine::EngineResponse;
//! use async_trait::async_trait;
//!
//! struct RequireApiKey;
//!
//! #[async_trait]
//! impl HttpMiddleware for RequireApiKey {
//!     async fn before_dispatch(
//!         &self,
//!         ctx: &mut RequestContext<'_>,
//!         _response: &mut dyn EngineResponse,
//!     ) -> Result<(), MiddlewareError> {
//!         if ctx.header("x-api-key").is_none() {
//!             return Err(MiddlewareError::unauthenticated("Missing API key"));
//!         }
//!         Ok(())
//!     }
//! }
//! ```

pub mod builtins;
pub mod context;
pub mod error;
pub mod stack;
pub mod traits;

pub use builtins::{AccessLog, JsonBodyParser, StaticHeaders};
pub use context::RequestContext;
pub use error::MiddlewareError;
pub use stack::MiddlewareStack;
pub use traits::HttpMiddleware;
