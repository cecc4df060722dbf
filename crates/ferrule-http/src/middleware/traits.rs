//! The middleware hook trait

use async_trait::async_trait;

use super::{MiddlewareError, RequestContext};
use crate::engine::EngineResponse;

/// Intercepts requests before they reach a route and responses after it
///
/// `before_dispatch` runs ahead of route matching. Headers it sets survive
/// into the final response. Metadata it attaches reaches the handler as
/// `RpcInput::metadata`. Returning an error ends the request with that error.
///
/// `after_dispatch` runs once the route has written its response and before
/// the engine finishes it. Only headers can still change.
///
/// ```rust,no_run
/// use ferrule_http::middleware::{HttpMiddleware, RequestContext, MiddlewareError};
/// use ferrule_http::engine::EngineResponse;
/// use async_trait::async_trait;
/// use serde_json::json;
///
/// struct TenantFromHeader;
///
/// #[async_trait]
/// impl HttpMiddleware for TenantFromHeader {
///     async fn before_dispatch(
///         &self,
///         ctx: &mut RequestContext<'_>,
///         _response: &mut dyn EngineResponse,
///     ) -> Result<(), MiddlewareError> {
///         let tenant = ctx
///             .header("x-tenant")
///             .ok_or_else(|| MiddlewareError::invalid_request("Missing tenant"))?
///             .to_string();
///         ctx.add_metadata("tenant", json!(tenant));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait HttpMiddleware: Send + Sync {
    /// Runs in registration order
    async fn before_dispatch(
        &self,
        ctx: &mut RequestContext<'_>,
        response: &mut dyn EngineResponse,
    ) -> Result<(), MiddlewareError>;

    /// Runs in reverse registration order; no-op unless overridden
    async fn after_dispatch(
        &self,
        _ctx: &mut RequestContext<'_>,
        _response: &mut dyn EngineResponse,
    ) -> Result<(), MiddlewareError> {
        Ok(())
    }
}
