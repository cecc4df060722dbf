//! # Hello Server
//!
//! Serves a two-operation greeter contract through the hyper engine.
//!
//! ## Usage
//! ```bash
//! cargo run --package hello-server -- --bind 127.0.0.1:8000
//! curl -s -X POST localhost:8000/hello -H 'content-type: application/json' -d '{"name":"world"}'
//! curl -s localhost:8000/greetings/world?lang=fr
//! curl -s localhost:8000/contract
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use ferrule_contract::{
    Contract, ContractOperation, Detailed, HandlerError, OutputStructure, RpcInput, TypedSchema,
    implement, implement_typed,
};
use ferrule_http::middleware::{AccessLog, JsonBodyParser, StaticHeaders};
use ferrule_http::{ContractModule, CorsConfig, HyperEngine, ModuleConfig, Router, ServerConfig};

#[derive(Parser)]
#[command(name = "hello-server", about = "Contract-routed greeter over HTTP")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Default output structure for operations that do not declare one
    #[arg(short, long, default_value = "raw")]
    output_structure: OutputStructure,

    /// Read CORS policy from FERRULE_CORS_* environment variables
    #[arg(long)]
    cors_from_env: bool,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct HelloInput {
    name: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct HelloOutput {
    greeting: String,
}

fn contract() -> ferrule_contract::Result<Contract> {
    Contract::builder()
        .operation(
            "hello",
            ContractOperation::post("/hello")?
                .summary("Greet someone by name")
                .output_structure(OutputStructure::Raw)
                .body(TypedSchema::<HelloInput>::new())
                .output(TypedSchema::<HelloOutput>::new()),
        )
        .operation(
            "greeting",
            ContractOperation::get("/greetings/:name")?
                .summary("Localized greeting with explicit status and headers")
                .output_structure(OutputStructure::Detailed),
        )
        .operation(
            "contract",
            ContractOperation::get("/contract")?.summary("Describe every operation"),
        )
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let contract = contract()?;
    let document = contract.document();

    let module = ContractModule::builder("greeter", &contract)
        .config(ModuleConfig::default().output_structure(args.output_structure))
        .implement(implement_typed("hello", |input: HelloInput, _rpc| async move {
            Ok(HelloOutput {
                greeting: format!("Hello, {}!", input.name),
            })
        }))
        .implement(implement("greeting", |input: RpcInput| async move {
            let name = input
                .path_param("name")
                .ok_or_else(|| HandlerError::bad_request("missing name"))?
                .to_string();
            let greeting = match input.query.get("lang").and_then(|v| v.as_str()) {
                Some("fr") => format!("Bonjour, {}!", name),
                Some("es") => format!("¡Hola, {}!", name),
                _ => format!("Hello, {}!", name),
            };
            let record = Detailed::new(200, json!({ "greeting": greeting }))
                .header("cache-control", "max-age=60");
            Ok(serde_json::to_value(record)?)
        }))
        .implement(implement("contract", move |_input| {
            let document = document.clone();
            async move { Ok(document) }
        }))
        .build()?;

    let cors = if args.cors_from_env {
        CorsConfig::from_env()
    } else {
        CorsConfig::allow_all()
    };
    cors.validate()?;

    let config = ServerConfig::default()
        .bind_address(args.bind)
        .cors_config(cors);
    let mut router = Router::new(config);
    router
        .layer(Arc::new(AccessLog))
        .layer(Arc::new(
            StaticHeaders::new().header("X-Custom-Middleware", "hello"),
        ))
        .layer(Arc::new(JsonBodyParser));

    let routes = module.register(&mut router)?;
    info!("Registered {} route(s) for module '{}'", routes, module.name());

    HyperEngine::new(router).run().await?;
    Ok(())
}
