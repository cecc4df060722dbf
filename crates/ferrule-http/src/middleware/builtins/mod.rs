//! Built-in middleware implementations
//!
//! - [`StaticHeaders`]: adds fixed headers to every response
//! - [`JsonBodyParser`]: parses JSON bodies ahead of the pipeline
//! - [`AccessLog`]: one `tracing` event per completed request
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ferrule_http::{Router, ServerConfig};
//! use ferrule_http::middleware::{AccessLog, StaticHeaders};
//!
//! let mut router = Router::new(ServerConfig::default());
//! router
//!     .layer(Arc::new(AccessLog))
//!     .layer(Arc::new(StaticHeaders::new().header("x-powered-by", "ferrule")));
//! ```

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use tracing::{debug, info};

use super::{HttpMiddleware, MiddlewareError, RequestContext};
use crate::engine::EngineResponse;

/// Sets fixed headers on the response before dispatch
///
/// Headers set here survive into the final response of every route.
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl StaticHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header; invalid names or values are ignored with a debug event
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            _ => debug!("Ignoring invalid static header {}: {}", name, value),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[async_trait]
impl HttpMiddleware for StaticHeaders {
    async fn before_dispatch(
        &self,
        _ctx: &mut RequestContext<'_>,
        response: &mut dyn EngineResponse,
    ) -> Result<(), MiddlewareError> {
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Parses `application/json` bodies and stores them on the request
///
/// The pipeline prefers a parsed body over raw bytes. Bodies that are not JSON
/// are left for the pipeline to decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyParser;

impl JsonBodyParser {
    fn is_json(ctx: &RequestContext<'_>) -> bool {
        ctx.header("content-type")
            .map(|ct| {
                let mime = ct.split(';').next().unwrap_or_default().trim();
                mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl HttpMiddleware for JsonBodyParser {
    async fn before_dispatch(
        &self,
        ctx: &mut RequestContext<'_>,
        _response: &mut dyn EngineResponse,
    ) -> Result<(), MiddlewareError> {
        if !Self::is_json(ctx) {
            return Ok(());
        }

        let request = ctx.request_mut();
        let bytes = match request.read_body().await {
            Ok(bytes) => bytes,
            // Read failures surface from the pipeline with the right status
            Err(e) => {
                debug!("JsonBodyParser skipped body: {}", e);
                return Ok(());
            }
        };

        if bytes.is_empty() {
            return Ok(());
        }

        match serde_json::from_slice(&bytes) {
            Ok(value) => request.set_parsed_body(value),
            Err(e) => {
                return Err(MiddlewareError::invalid_request(format!(
                    "Malformed JSON body: {}",
                    e
                )));
            }
        }
        Ok(())
    }
}

/// Logs method, path, status and request id once the route has responded
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

#[async_trait]
impl HttpMiddleware for AccessLog {
    async fn before_dispatch(
        &self,
        ctx: &mut RequestContext<'_>,
        _response: &mut dyn EngineResponse,
    ) -> Result<(), MiddlewareError> {
        debug!(method = %ctx.method(), path = ctx.path(), "request received");
        Ok(())
    }

    async fn after_dispatch(
        &self,
        ctx: &mut RequestContext<'_>,
        response: &mut dyn EngineResponse,
    ) -> Result<(), MiddlewareError> {
        let request_id = ctx
            .metadata()
            .get("requestId")
            .and_then(|v| v.as_str())
            .unwrap_or("-")
            .to_string();
        info!(
            method = %ctx.method(),
            path = ctx.path(),
            status = response.status().as_u16(),
            request_id = %request_id,
            "request completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineRequest;
    use crate::server::{HyperRequest, HyperResponse};
    use bytes::Bytes;
    use http_body_util::Full;
    use serde_json::json;

    fn request(content_type: Option<&str>, body: &'static str) -> HyperRequest<Full<Bytes>> {
        let mut builder = http::Request::builder().method("POST").uri("/hello");
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        HyperRequest::new(builder.body(Full::new(Bytes::from(body))).unwrap(), 1024)
    }

    #[tokio::test]
    async fn test_static_headers() {
        let middleware = StaticHeaders::new()
            .header("X-Custom-Middleware", "hello")
            .header("bad header", "x");
        assert_eq!(middleware.len(), 1);

        let mut req = request(None, "");
        let mut res = HyperResponse::new(req.cancellation_token());
        let mut ctx = RequestContext::new(&mut req);

        middleware.before_dispatch(&mut ctx, &mut res).await.unwrap();
        assert_eq!(res.headers().get("x-custom-middleware").unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_json_body_parser_sets_parsed_body() {
        let mut req = request(Some("application/json; charset=utf-8"), r#"{"name":"world"}"#);
        let mut res = HyperResponse::new(req.cancellation_token());
        {
            let mut ctx = RequestContext::new(&mut req);
            JsonBodyParser.before_dispatch(&mut ctx, &mut res).await.unwrap();
        }
        assert_eq!(req.parsed_body(), Some(&json!({"name": "world"})));
    }

    #[tokio::test]
    async fn test_json_body_parser_ignores_other_content_types() {
        let mut req = request(Some("text/plain"), "hello");
        let mut res = HyperResponse::new(req.cancellation_token());
        {
            let mut ctx = RequestContext::new(&mut req);
            JsonBodyParser.before_dispatch(&mut ctx, &mut res).await.unwrap();
        }
        assert!(req.parsed_body().is_none());
    }

    #[tokio::test]
    async fn test_json_body_parser_rejects_malformed_json() {
        let mut req = request(Some("application/json"), "{not json");
        let mut res = HyperResponse::new(req.cancellation_token());
        let mut ctx = RequestContext::new(&mut req);

        let err = JsonBodyParser
            .before_dispatch(&mut ctx, &mut res)
            .await
            .unwrap_err();
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
    }
}
