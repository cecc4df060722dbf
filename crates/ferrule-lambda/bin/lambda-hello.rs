//! Minimal Lambda greeter
//!
//! ```bash
//! cargo lambda watch --package ferrule-lambda --bin lambda-hello
//! curl -s -X POST localhost:9000/hello -H 'content-type: application/json' -d '{"name":"world"}'
//! ```

use std::sync::Arc;

use ferrule_contract::{Contract, ContractOperation, JsonSchema, RpcInput, implement};
use ferrule_http::middleware::{AccessLog, JsonBodyParser};
use ferrule_http::{ContractModule, Router, ServerConfig, ServerEngine};
use ferrule_lambda::LambdaEngine;
use lambda_http::{Error, run, service_fn};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .init();

    let contract = Contract::builder()
        .operation(
            "hello",
            ContractOperation::post("/hello")?.body(JsonSchema::new(json!({
                "type": "object",
                "required": ["name"],
                "properties": { "name": { "type": "string" } }
            }))?),
        )
        .build()?;

    let module = ContractModule::builder("greeter", &contract)
        .implement(implement("hello", |input: RpcInput| async move {
            let name = input.body["name"].as_str().unwrap_or("stranger").to_string();
            Ok(json!({ "greeting": format!("Hello, {}!", name) }))
        }))
        .build()?;

    let mut router = Router::new(ServerConfig::default());
    router
        .layer(Arc::new(AccessLog))
        .layer(Arc::new(JsonBodyParser));
    module.register(&mut router)?;

    let engine = LambdaEngine::new(router);
    engine.ready().await?;
    tracing::info!("Lambda greeter ready");

    run(service_fn(move |req| {
        let engine = engine.clone();
        async move { engine.handle(req).await.map_err(Error::from) }
    }))
    .await
}
