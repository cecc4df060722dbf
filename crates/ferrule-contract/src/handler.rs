//! Handler bindings for contract operations
//!
//! Controllers do not annotate methods; they hand the module an explicit
//! table of [`Implementation`]s built with [`implement`] or [`implement_typed`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use http::{HeaderMap, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::HandlerError;

/// Validated, normalized input handed to user code
#[derive(Debug, Clone)]
pub struct RpcInput {
    pub method: Method,
    pub path: String,
    pub path_params: Map<String, Value>,
    pub query: Map<String, Value>,
    pub headers: HeaderMap,
    pub body: Value,
    /// Values attached by upstream middleware
    pub metadata: Map<String, Value>,
}

impl RpcInput {
    /// Input with only a body, as used by tests and in-process calls
    pub fn from_body(body: Value) -> Self {
        Self {
            method: Method::POST,
            path: String::new(),
            path_params: Map::new(),
            query: Map::new(),
            headers: HeaderMap::new(),
            body,
            metadata: Map::new(),
        }
    }

    /// Deserialize the validated body
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| HandlerError::bad_request(format!("invalid body: {}", e)))
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).and_then(Value::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// User code implementing one contract operation
#[async_trait]
pub trait ContractHandler: Send + Sync {
    async fn handle(&self, input: RpcInput) -> Result<Value, HandlerError>;
}

/// Closure-backed handler
pub struct FnHandler<F>
where
    F: Fn(RpcInput) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync,
{
    handler_fn: F,
}

impl<F> FnHandler<F>
where
    F: Fn(RpcInput) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F> ContractHandler for FnHandler<F>
where
    F: Fn(RpcInput) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync,
{
    async fn handle(&self, input: RpcInput) -> Result<Value, HandlerError> {
        (self.handler_fn)(input).await
    }
}

/// A handler configured for a named operation
#[derive(Clone)]
pub struct Implementation {
    operation: String,
    handler: Arc<dyn ContractHandler>,
}

impl Implementation {
    pub fn new(operation: impl Into<String>, handler: Arc<dyn ContractHandler>) -> Self {
        Self {
            operation: operation.into(),
            handler,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn handler(&self) -> Arc<dyn ContractHandler> {
        Arc::clone(&self.handler)
    }
}

impl std::fmt::Debug for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Implementation")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Implement an operation with an async closure over [`RpcInput`]
///
/// ```
/// # use ferrule_contract::{implement, RpcInput};
/// # use serde_json::json;
/// let hello = implement("hello", |input: RpcInput| async move {
///     let name = input.body["name"].as_str().unwrap_or("stranger").to_string();
///     Ok(json!({ "greeting": format!("Hello, {}!", name) }))
/// });
/// assert_eq!(hello.operation(), "hello");
/// ```
pub fn implement<F, Fut>(operation: impl Into<String>, f: F) -> Implementation
where
    F: Fn(RpcInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    let handler = FnHandler::new(move |input| -> BoxFuture<'static, _> { Box::pin(f(input)) });
    Implementation::new(operation, Arc::new(handler))
}

/// Implement an operation with typed body input and typed output
///
/// The closure receives the body deserialized as `I` alongside the full input;
/// its `O` is serialized into the handler result.
pub fn implement_typed<I, O, F, Fut>(operation: impl Into<String>, f: F) -> Implementation
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I, RpcInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, HandlerError>> + Send + 'static,
{
    let f = Arc::new(f);
    implement(operation, move |input: RpcInput| {
        let f = Arc::clone(&f);
        async move {
            let typed: I = input.body_as()?;
            let output = f(typed, input).await?;
            Ok::<Value, HandlerError>(serde_json::to_value(output)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Detailed;
    use http::StatusCode;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct HelloInput {
        name: String,
    }

    #[derive(Serialize)]
    struct HelloOutput {
        greeting: String,
    }

    #[tokio::test]
    async fn test_implement_closure() {
        let implementation = implement("hello", |input: RpcInput| async move {
            Ok(json!({ "echo": input.body }))
        });

        let result = implementation
            .handler()
            .handle(RpcInput::from_body(json!(1)))
            .await
            .unwrap();
        assert_eq!(result, json!({"echo": 1}));
    }

    #[tokio::test]
    async fn test_implement_typed() {
        let implementation = implement_typed("hello", |body: HelloInput, _input| async move {
            Ok(HelloOutput {
                greeting: format!("Hello, {}!", body.name),
            })
        });

        let result = implementation
            .handler()
            .handle(RpcInput::from_body(json!({"name": "world"})))
            .await
            .unwrap();
        assert_eq!(result, json!({"greeting": "Hello, world!"}));
    }

    #[tokio::test]
    async fn test_implement_typed_detailed() {
        let implementation = implement_typed("create", |body: HelloInput, _input| async move {
            Ok(Detailed::new(201, json!({ "created": body.name })))
        });

        let result = implementation
            .handler()
            .handle(RpcInput::from_body(json!({"name": "x"})))
            .await
            .unwrap();
        assert_eq!(result, json!({"status": 201, "result": {"created": "x"}}));
    }

    #[tokio::test]
    async fn test_typed_body_mismatch_is_bad_request() {
        let implementation = implement_typed("hello", |body: HelloInput, _input| async move {
            Ok(body.name)
        });

        let err = implementation
            .handler()
            .handle(RpcInput::from_body(json!({"nom": "world"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Status { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[test]
    fn test_input_accessors() {
        let mut input = RpcInput::from_body(Value::Null);
        input.path_params.insert("id".to_string(), json!("42"));
        input
            .headers
            .insert("x-trace", http::HeaderValue::from_static("abc"));
        assert_eq!(input.path_param("id"), Some("42"));
        assert_eq!(input.header("X-Trace"), Some("abc"));
        assert_eq!(input.path_param("missing"), None);
    }
}
