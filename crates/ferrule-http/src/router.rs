//! Host router: CORS, middleware chain and per-route method/path dispatch
//!
//! The router is engine-agnostic. Engines hand it a `dyn EngineRequest` and a
//! `dyn EngineResponse`; the router always leaves the response finished unless
//! the peer has gone away.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use ferrule_contract::{ConfigError, PathTemplate, generic_failure_body};

use crate::config::ServerConfig;
use crate::engine::{EngineRequest, EngineResponse, TransportError, write_json};
use crate::middleware::{HttpMiddleware, MiddlewareError, MiddlewareStack, RequestContext};
use crate::normalize::uppercase_method;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The `(method, path template)` pairs a module registered
pub type RouteSignature = BTreeSet<(String, String)>;

/// Errors a route hands back to the router's error layer
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The engine abandoned the request; nothing may be written
    #[error("request cancelled")]
    Cancelled,
}

/// Request handed to a matched route
pub struct RouteRequest<'a> {
    pub request: &'a mut dyn EngineRequest,
    /// Decoded parameters from the matched path template
    pub path_params: Map<String, Value>,
    /// Metadata attached by middleware
    pub metadata: Map<String, Value>,
}

/// Route implementation registered with the router
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn call(
        &self,
        request: RouteRequest<'_>,
        response: &mut dyn EngineResponse,
    ) -> Result<(), RouteError>;
}

struct Route {
    method: Method,
    path: PathTemplate,
    handler: Arc<dyn RouteHandler>,
}

enum RouteMatch<'r> {
    Found(&'r Route, Map<String, Value>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Routes plus the middleware that runs in front of them
pub struct Router {
    config: ServerConfig,
    routes: Vec<Route>,
    middleware: MiddlewareStack,
    mounted: HashMap<String, RouteSignature>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl Router {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: Vec::new(),
            middleware: MiddlewareStack::new(),
            mounted: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Append middleware; it runs after every layer added before it
    pub fn layer(&mut self, middleware: Arc<dyn HttpMiddleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    pub fn middleware(&self) -> &MiddlewareStack {
        &self.middleware
    }

    /// Register a route
    ///
    /// Fails with [`ConfigError::DuplicateRoute`] when a route with the same
    /// method could match the same request paths.
    pub fn route(
        &mut self,
        method: Method,
        path: PathTemplate,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<&mut Self, ConfigError> {
        self.check_route(&method, &path)?;
        debug!("Registered route {} {}", method, path);
        self.routes.push(Route {
            method,
            path,
            handler,
        });
        Ok(self)
    }

    /// Would registering `method path` conflict with an existing route
    pub fn check_route(&self, method: &Method, path: &PathTemplate) -> Result<(), ConfigError> {
        match self
            .routes
            .iter()
            .find(|route| &route.method == method && route.path.conflicts_with(path))
        {
            Some(existing) => Err(ConfigError::DuplicateRoute {
                method: method.clone(),
                path: path.to_string(),
                existing: existing.path.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Registered routes in registration order
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &PathTemplate)> {
        self.routes.iter().map(|route| (&route.method, &route.path))
    }

    pub fn is_mounted(&self, module: &str) -> bool {
        self.mounted.contains_key(module)
    }

    /// Routes recorded for a mounted module
    pub fn mounted_routes(&self, module: &str) -> Option<&RouteSignature> {
        self.mounted.get(module)
    }

    pub(crate) fn mark_mounted(&mut self, module: &str, routes: RouteSignature) {
        self.mounted.insert(module.to_string(), routes);
    }

    fn match_route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut best: Option<(&Route, Map<String, Value>)> = None;
        let mut allowed = BTreeSet::new();

        for route in &self.routes {
            let Some(params) = route.path.matches(path) else {
                continue;
            };
            if &route.method != method {
                allowed.insert(route.method.as_str().to_string());
                continue;
            }
            let better = best
                .as_ref()
                .map(|(current, _)| route.path.static_segments() > current.path.static_segments())
                .unwrap_or(true);
            if better {
                best = Some((route, params));
            }
        }

        match best {
            Some((route, params)) => RouteMatch::Found(route, params),
            None if !allowed.is_empty() => RouteMatch::MethodNotAllowed(
                allowed
                    .into_iter()
                    .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
                    .collect(),
            ),
            None => RouteMatch::NotFound,
        }
    }

    /// Run one request through CORS, middleware, the matched route and finalization
    pub async fn dispatch(
        &self,
        request: &mut dyn EngineRequest,
        response: &mut dyn EngineResponse,
    ) {
        let method = uppercase_method(request.method());
        let path = request.uri().path().to_string();

        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        debug!("Handling {} {} (request_id={})", method, path, request_id);

        if self.config.enable_cors {
            let origin = request
                .headers()
                .get(header::ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            if method == Method::OPTIONS
                && request
                    .headers()
                    .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
            {
                debug!("Answering CORS preflight for {}", path);
                self.config
                    .cors
                    .apply_preflight(response.headers_mut(), origin.as_deref());
                if let Err(e) = write_json(response, StatusCode::NO_CONTENT, &Value::Null) {
                    debug!("Failed to write preflight response: {}", e);
                }
                self.finish(response).await;
                return;
            }

            self.config
                .cors
                .apply(response.headers_mut(), origin.as_deref());
        }

        let mut ctx = RequestContext::new(request);
        ctx.add_metadata("requestId", json!(request_id));

        if let Err(err) = self.middleware.execute_before(&mut ctx, response).await {
            debug!("Middleware rejected {} {}: {}", method, path, err);
            write_middleware_error(response, &err);
            self.finish(response).await;
            return;
        }

        match self.match_route(&method, &path) {
            RouteMatch::Found(route, path_params) => {
                let route_request = RouteRequest {
                    path_params,
                    metadata: ctx.metadata().clone(),
                    request: ctx.request_mut(),
                };
                if let Err(err) = route.handler.call(route_request, response).await {
                    handle_route_error(err, response);
                }
            }
            RouteMatch::MethodNotAllowed(allowed) => {
                debug!("{} not allowed on {}", method, path);
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                let body = json!({ "message": format!("Method {} not allowed", method) });
                write_or_log(response, StatusCode::METHOD_NOT_ALLOWED, &body);
            }
            RouteMatch::NotFound => {
                debug!("No route for {} {}", method, path);
                let body = json!({ "message": format!("Cannot {} {}", method, path) });
                write_or_log(response, StatusCode::NOT_FOUND, &body);
            }
        }

        if response.is_closed() {
            debug!("Client went away during {} {}", method, path);
            return;
        }

        if let Err(err) = self.middleware.execute_after(&mut ctx, response).await {
            warn!("after_dispatch middleware failed for {} {}: {}", method, path, err);
        }

        self.finish(response).await;
    }

    async fn finish(&self, response: &mut dyn EngineResponse) {
        if response.is_closed() || response.is_finished() {
            return;
        }
        if let Err(e) = response.finish().await {
            warn!("Failed to finish response: {}", e);
        }
    }
}

fn write_or_log(response: &mut dyn EngineResponse, status: StatusCode, body: &Value) {
    if let Err(e) = write_json(response, status, body) {
        debug!("Failed to write {} response: {}", status, e);
    }
}

fn write_middleware_error(response: &mut dyn EngineResponse, err: &MiddlewareError) {
    if let MiddlewareError::Internal(msg) = err {
        error!("Middleware internal error: {}", msg);
    }
    if let Some(seconds) = err.retry_after() {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    }
    write_or_log(response, err.status(), &err.to_body());
}

/// Map an error escaping a route to a response
///
/// Read failures are the client's fault; anything else is a generic 500.
fn handle_route_error(err: RouteError, response: &mut dyn EngineResponse) {
    let transport = match err {
        RouteError::Cancelled => {
            debug!("Request cancelled; no response written");
            return;
        }
        RouteError::Transport(transport) => transport,
    };

    if response.is_closed() {
        debug!("Transport error after client left: {}", transport);
        return;
    }

    let (status, body) = match &transport {
        TransportError::BodyTooLarge { .. } => (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "message": "Request body too large" }),
        ),
        TransportError::InvalidUtf8 => (
            StatusCode::BAD_REQUEST,
            json!({ "message": "Request body must be valid UTF-8" }),
        ),
        TransportError::BodyRead(_) => (
            StatusCode::BAD_REQUEST,
            json!({ "message": "Failed to read request body" }),
        ),
        _ => {
            error!("Route failed: {}", transport);
            (StatusCode::INTERNAL_SERVER_ERROR, generic_failure_body())
        }
    };

    if response.is_written() {
        error!("Route failed after writing its response: {}", transport);
        return;
    }
    write_or_log(response, status, &body);
}
