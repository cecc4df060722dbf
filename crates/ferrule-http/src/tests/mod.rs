//! Test modules for ferrule-http
//!
//! End-to-end scenarios drive the hyper engine in-process: an `http::Request`
//! goes through `HyperEngine::handle` and the resulting `http::Response` is
//! inspected. No sockets are opened.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use ferrule_contract::{
    Contract, ContractOperation, Detailed, Implementation, JsonSchema, OutputStructure,
    implement_typed,
};

use crate::middleware::{JsonBodyParser, StaticHeaders};
use crate::{ContractModule, HyperEngine, ModuleConfig, Router, ServerConfig};

#[derive(Debug, Deserialize)]
pub struct HelloInput {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct HelloOutput {
    pub greeting: String,
}

pub fn hello_schema() -> JsonSchema {
    JsonSchema::new(json!({
        "type": "object",
        "required": ["name"],
        "properties": { "name": { "type": "string" } }
    }))
    .unwrap()
}

/// `POST /hello` taking `{"name": string}`
pub fn greeter_contract() -> Contract {
    Contract::builder()
        .operation(
            "hello",
            ContractOperation::post("/hello").unwrap().body(hello_schema()),
        )
        .build()
        .unwrap()
}

/// Raw-mode greeter that counts invocations
pub fn hello_impl(calls: Arc<AtomicUsize>) -> Implementation {
    implement_typed("hello", move |input: HelloInput, _rpc| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(HelloOutput {
                greeting: format!("Hello, {}!", input.name),
            })
        }
    })
}

/// Detailed-mode greeter answering 201 with a location header
pub fn hello_detailed_impl() -> Implementation {
    implement_typed("hello", |input: HelloInput, _rpc| async move {
        Ok(Detailed::new(
            201,
            HelloOutput {
                greeting: format!("Hello, {}!", input.name),
            },
        )
        .header("location", format!("/greetings/{}", input.name)))
    })
}

/// Router with the custom-header middleware and JSON body parsing in front
pub fn router_with_middleware(config: ServerConfig) -> Router {
    let mut router = Router::new(config);
    router
        .layer(Arc::new(
            StaticHeaders::new().header("X-Custom-Middleware", "hello"),
        ))
        .layer(Arc::new(JsonBodyParser));
    router
}

pub fn greeter_engine(structure: OutputStructure, calls: Arc<AtomicUsize>) -> HyperEngine {
    let implementation = match structure {
        OutputStructure::Raw => hello_impl(calls),
        OutputStructure::Detailed => hello_detailed_impl(),
    };
    let module = ContractModule::builder("greeter", &greeter_contract())
        .config(ModuleConfig::default().output_structure(structure))
        .implement(implementation)
        .build()
        .unwrap();

    let mut router = router_with_middleware(ServerConfig::default());
    module.register(&mut router).unwrap();
    HyperEngine::new(router)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("origin", "https://app.example")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Split a response into status, headers and body parsed as JSON (`null` if empty)
pub async fn read_json(response: Response<Full<Bytes>>) -> (http::StatusCode, http::HeaderMap, Value) {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (parts.status, parts.headers, value)
}
