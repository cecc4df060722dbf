//! Lambda engine
//!
//! Unlike the hyper engine, a Lambda engine starts cold: it answers 503 until
//! [`LambdaEngine::ready`] has completed. Call it once during cold start,
//! before handing the engine to the Lambda runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use http::StatusCode;
use lambda_http::{Body as LambdaBody, Request as LambdaRequest, Response as LambdaResponse};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ferrule_http::{Router, ServerEngine, TransportError, write_json};

use crate::adapter::{LambdaRequestAdapter, LambdaResponseWriter};
use crate::error::Result;

/// Engine serving a [`Router`] from Lambda invocations
#[derive(Clone)]
pub struct LambdaEngine {
    router: Arc<Router>,
    ready: Arc<AtomicBool>,
}

impl LambdaEngine {
    /// Create a cold engine; requests get 503 until [`LambdaEngine::ready`] completes
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one invocation
    pub async fn handle(&self, request: LambdaRequest) -> Result<LambdaResponse<LambdaBody>> {
        self.handle_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Handle one invocation that is abandoned when `cancellation` fires
    pub async fn handle_with_cancellation(
        &self,
        request: LambdaRequest,
        cancellation: CancellationToken,
    ) -> Result<LambdaResponse<LambdaBody>> {
        let mut writer = LambdaResponseWriter::new(cancellation.clone());

        if !self.is_ready() {
            warn!(
                "Rejecting {} {}: Lambda engine not ready",
                request.method(),
                request.uri().path()
            );
            write_json(
                &mut writer,
                StatusCode::SERVICE_UNAVAILABLE,
                &json!({ "message": "Service not ready" }),
            )?;
            return Ok(writer.into_response());
        }

        let max_body_size = self.router.config().max_body_size;
        let mut adapter = LambdaRequestAdapter::new(request, max_body_size, cancellation);
        self.router.dispatch(&mut adapter, &mut writer).await;

        Ok(writer.into_response())
    }
}

#[async_trait]
impl ServerEngine for LambdaEngine {
    fn name(&self) -> &'static str {
        "lambda"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Validate configuration and start accepting traffic
    async fn ready(&self) -> std::result::Result<(), TransportError> {
        if self.is_ready() {
            debug!("Lambda engine already ready");
            return Ok(());
        }

        let config = self.router.config();
        if config.enable_cors {
            config
                .cors
                .validate()
                .map_err(|e| TransportError::NotReady(e.to_string()))?;
        }

        self.ready.store(true, Ordering::Release);
        info!(
            "Lambda engine ready with {} route(s)",
            self.router.route_count()
        );
        Ok(())
    }
}
