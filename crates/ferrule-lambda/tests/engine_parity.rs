//! Engine parity tests
//!
//! The same router configuration is served through the hyper engine and the
//! Lambda engine; every request must produce the same status, headers of
//! interest and body on both.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use lambda_http::Body as LambdaBody;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use ferrule_contract::{
    Contract, ContractOperation, Detailed, JsonSchema, OutputStructure, implement_typed,
};
use ferrule_http::middleware::{JsonBodyParser, StaticHeaders};
use ferrule_http::{ContractModule, HyperEngine, ModuleConfig, Router, ServerConfig, ServerEngine};
use ferrule_lambda::LambdaEngine;

#[derive(Deserialize)]
struct HelloInput {
    name: String,
}

#[derive(Serialize)]
struct HelloOutput {
    greeting: String,
}

fn name_schema() -> JsonSchema {
    JsonSchema::new(json!({
        "type": "object",
        "required": ["name"],
        "properties": { "name": { "type": "string" } }
    }))
    .unwrap()
}

fn contract() -> Contract {
    Contract::builder()
        .operation(
            "hello",
            ContractOperation::post("/hello").unwrap().body(name_schema()),
        )
        .operation(
            "welcome",
            ContractOperation::post("/welcome")
                .unwrap()
                .body(name_schema())
                .output_structure(OutputStructure::Detailed),
        )
        .build()
        .unwrap()
}

fn router() -> Router {
    let module = ContractModule::builder("greeter", &contract())
        .config(ModuleConfig::default())
        .implement(implement_typed("hello", |input: HelloInput, _rpc| async move {
            Ok(HelloOutput {
                greeting: format!("Hello, {}!", input.name),
            })
        }))
        .implement(implement_typed("welcome", |input: HelloInput, _rpc| async move {
            Ok(Detailed::new(
                201,
                HelloOutput {
                    greeting: format!("Welcome, {}!", input.name),
                },
            ))
        }))
        .build()
        .unwrap();

    let mut router = Router::new(ServerConfig::default());
    router
        .layer(Arc::new(
            StaticHeaders::new().header("X-Custom-Middleware", "hello"),
        ))
        .layer(Arc::new(JsonBodyParser));
    module.register(&mut router).unwrap();
    router
}

struct Observed {
    status: StatusCode,
    custom_header: Option<String>,
    cors_origin: Option<String>,
    body: Value,
}

fn parse(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap()
    }
}

fn header(headers: &http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn via_hyper(engine: &HyperEngine, method: &str, uri: &str, body: &str) -> Observed {
    let request = http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    let (parts, body) = engine.handle(request).await.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();

    Observed {
        status: parts.status,
        custom_header: header(&parts.headers, "x-custom-middleware"),
        cors_origin: header(&parts.headers, "access-control-allow-origin"),
        body: parse(&bytes),
    }
}

async fn via_lambda(engine: &LambdaEngine, method: &str, uri: &str, body: &str) -> Observed {
    let request = http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(if body.is_empty() {
            LambdaBody::Empty
        } else {
            LambdaBody::Text(body.to_string())
        })
        .unwrap();
    let response = engine.handle(request).await.unwrap();
    let bytes: &[u8] = match response.body() {
        LambdaBody::Text(text) => text.as_bytes(),
        LambdaBody::Binary(bytes) => bytes.as_slice(),
        _ => &[],
    };

    Observed {
        status: response.status(),
        custom_header: header(response.headers(), "x-custom-middleware"),
        cors_origin: header(response.headers(), "access-control-allow-origin"),
        body: parse(bytes),
    }
}

#[tokio::test]
async fn test_engines_produce_identical_responses() {
    let hyper = HyperEngine::new(router());
    let lambda = LambdaEngine::new(router());
    lambda.ready().await.unwrap();

    let cases = [
        ("POST", "/hello", r#"{"name":"world"}"#, StatusCode::OK),
        ("POST", "/welcome", r#"{"name":"world"}"#, StatusCode::CREATED),
        ("POST", "/hello", r#"{"name":5}"#, StatusCode::BAD_REQUEST),
        ("POST", "/hello", "", StatusCode::BAD_REQUEST),
        ("GET", "/hello", "", StatusCode::METHOD_NOT_ALLOWED),
        ("GET", "/missing", "", StatusCode::NOT_FOUND),
    ];

    for (method, uri, body, expected) in cases {
        let h = via_hyper(&hyper, method, uri, body).await;
        let l = via_lambda(&lambda, method, uri, body).await;

        assert_eq!(h.status, expected, "hyper {} {}", method, uri);
        assert_eq!(l.status, expected, "lambda {} {}", method, uri);
        assert_eq!(h.body, l.body, "{} {}", method, uri);
        assert_eq!(h.custom_header.as_deref(), Some("hello"));
        assert_eq!(l.custom_header.as_deref(), Some("hello"));
        assert_eq!(h.cors_origin, l.cors_origin);
    }
}

#[tokio::test]
async fn test_raw_greeting_on_both_engines() {
    let hyper = HyperEngine::new(router());
    let lambda = LambdaEngine::new(router());
    lambda.ready().await.unwrap();

    let body = r#"{"name":"world"}"#;
    for observed in [
        via_hyper(&hyper, "POST", "/hello", body).await,
        via_lambda(&lambda, "POST", "/hello", body).await,
    ] {
        assert_eq!(observed.status, StatusCode::OK);
        assert_eq!(observed.body, json!({"greeting": "Hello, world!"}));
        assert_eq!(observed.custom_header.as_deref(), Some("hello"));
        assert_eq!(observed.cors_origin.as_deref(), Some("*"));
    }
}

#[tokio::test]
async fn test_lambda_rejects_traffic_before_ready() {
    let hyper = HyperEngine::new(router());
    let lambda = LambdaEngine::new(router());
    assert!(hyper.is_ready());
    assert!(!lambda.is_ready());

    let body = r#"{"name":"world"}"#;
    let before = via_lambda(&lambda, "POST", "/hello", body).await;
    assert_eq!(before.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(before.body, json!({"message": "Service not ready"}));

    lambda.ready().await.unwrap();
    let after = via_lambda(&lambda, "POST", "/hello", body).await;
    assert_eq!(after.status, StatusCode::OK);
    assert_eq!(after.body, via_hyper(&hyper, "POST", "/hello", body).await.body);
}
