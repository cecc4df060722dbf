//! Ordered middleware execution

use std::sync::Arc;

use tracing::trace;

use super::{HttpMiddleware, MiddlewareError, RequestContext};
use crate::engine::EngineResponse;

/// Middleware in registration order
///
/// `before_dispatch` hooks run first to last and `after_dispatch` hooks run
/// last to first. In both directions the first error ends the walk.
#[derive(Default, Clone)]
pub struct MiddlewareStack {
    layers: Vec<Arc<dyn HttpMiddleware>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn HttpMiddleware>) {
        self.layers.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub async fn execute_before(
        &self,
        ctx: &mut RequestContext<'_>,
        response: &mut dyn EngineResponse,
    ) -> Result<(), MiddlewareError> {
        for (index, layer) in self.layers.iter().enumerate() {
            trace!("before_dispatch layer {} for {}", index, ctx.path());
            layer.before_dispatch(ctx, response).await?;
        }
        Ok(())
    }

    pub async fn execute_after(
        &self,
        ctx: &mut RequestContext<'_>,
        response: &mut dyn EngineResponse,
    ) -> Result<(), MiddlewareError> {
        for (index, layer) in self.layers.iter().enumerate().rev() {
            trace!("after_dispatch layer {} for {}", index, ctx.path());
            layer.after_dispatch(ctx, response).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineRequest;
    use crate::server::{HyperRequest, HyperResponse};
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::HeaderValue;
    use http_body_util::Full;
    use serde_json::json;

    /// Copies `x-tenant` into metadata; rejects requests without it
    struct TenantGate;

    #[async_trait]
    impl HttpMiddleware for TenantGate {
        async fn before_dispatch(
            &self,
            ctx: &mut RequestContext<'_>,
            _response: &mut dyn EngineResponse,
        ) -> Result<(), MiddlewareError> {
            let tenant = ctx
                .header("x-tenant")
                .ok_or_else(|| MiddlewareError::forbidden("tenant required"))?
                .to_string();
            ctx.add_metadata("tenant", json!(tenant));
            Ok(())
        }
    }

    /// Appends its name to `x-trail` on the way in and on the way out
    struct Trail(&'static str);

    impl Trail {
        fn stamp(&self, response: &mut dyn EngineResponse, phase: &str) {
            let value = format!("{}:{}", phase, self.0);
            if let Ok(value) = HeaderValue::from_str(&value) {
                response.headers_mut().append("x-trail", value);
            }
        }
    }

    #[async_trait]
    impl HttpMiddleware for Trail {
        async fn before_dispatch(
            &self,
            _ctx: &mut RequestContext<'_>,
            response: &mut dyn EngineResponse,
        ) -> Result<(), MiddlewareError> {
            self.stamp(response, "in");
            Ok(())
        }

        async fn after_dispatch(
            &self,
            _ctx: &mut RequestContext<'_>,
            response: &mut dyn EngineResponse,
        ) -> Result<(), MiddlewareError> {
            self.stamp(response, "out");
            Ok(())
        }
    }

    fn request(tenant: Option<&str>) -> HyperRequest<Full<Bytes>> {
        let mut builder = http::Request::builder().uri("/orders");
        if let Some(tenant) = tenant {
            builder = builder.header("x-tenant", tenant);
        }
        HyperRequest::new(builder.body(Full::new(Bytes::new())).unwrap(), 1024)
    }

    fn trail(response: &HyperResponse) -> Vec<&str> {
        response
            .headers()
            .get_all("x-trail")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_hooks_nest_around_dispatch() {
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(Trail("outer")));
        stack.push(Arc::new(TenantGate));
        stack.push(Arc::new(Trail("inner")));
        assert_eq!(stack.len(), 3);

        let mut req = request(Some("acme"));
        let mut res = HyperResponse::new(req.cancellation());
        let mut ctx = RequestContext::new(&mut req);

        stack.execute_before(&mut ctx, &mut res).await.unwrap();
        assert_eq!(ctx.metadata()["tenant"], "acme");
        stack.execute_after(&mut ctx, &mut res).await.unwrap();

        assert_eq!(
            trail(&res),
            vec!["in:outer", "in:inner", "out:inner", "out:outer"]
        );
    }

    #[tokio::test]
    async fn test_rejection_skips_later_layers() {
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(Trail("outer")));
        stack.push(Arc::new(TenantGate));
        stack.push(Arc::new(Trail("inner")));

        let mut req = request(None);
        let mut res = HyperResponse::new(req.cancellation());
        let mut ctx = RequestContext::new(&mut req);

        let err = stack.execute_before(&mut ctx, &mut res).await.unwrap_err();
        assert_eq!(err, MiddlewareError::forbidden("tenant required"));
        assert_eq!(trail(&res), vec!["in:outer"]);
        assert!(ctx.metadata().is_empty());
    }

    #[tokio::test]
    async fn test_empty_stack_is_transparent() {
        let stack = MiddlewareStack::new();
        assert!(stack.is_empty());

        let mut req = request(None);
        let mut res = HyperResponse::new(req.cancellation());
        let mut ctx = RequestContext::new(&mut req);

        stack.execute_before(&mut ctx, &mut res).await.unwrap();
        stack.execute_after(&mut ctx, &mut res).await.unwrap();
        assert!(res.headers().is_empty());
    }
}
