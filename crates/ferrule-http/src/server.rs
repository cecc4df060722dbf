//! Hyper engine: adapters over `http::Request`/`http::Response` and the
//! HTTP/1.1 accept loop
//!
//! This engine is ready as soon as it is constructed.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::{EngineRequest, EngineResponse, ServerEngine, TransportError};
use crate::router::Router;
use crate::Result;

enum BodyState<B> {
    Pending(B),
    Read(Bytes),
    TooLarge,
    Failed(String),
    Taken,
}

/// `EngineRequest` over any `http_body::Body`
pub struct HyperRequest<B> {
    parts: http::request::Parts,
    body: BodyState<B>,
    parsed: Option<Value>,
    max_body_size: usize,
    cancellation: CancellationToken,
}

impl<B> HyperRequest<B> {
    pub fn new(request: Request<B>, max_body_size: usize) -> Self {
        Self::with_cancellation(request, max_body_size, CancellationToken::new())
    }

    pub fn with_cancellation(
        request: Request<B>,
        max_body_size: usize,
        cancellation: CancellationToken,
    ) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            body: BodyState::Pending(body),
            parsed: None,
            max_body_size,
            cancellation,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn declared_length(&self) -> Option<usize> {
        self.parts
            .headers
            .get(http::header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }
}

#[async_trait]
impl<B> EngineRequest for HyperRequest<B>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn method(&self) -> &Method {
        &self.parts.method
    }

    fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    fn parsed_body(&self) -> Option<&Value> {
        self.parsed.as_ref()
    }

    fn set_parsed_body(&mut self, body: Value) {
        self.parsed = Some(body);
    }

    async fn read_body(&mut self) -> std::result::Result<Bytes, TransportError> {
        let limit = self.max_body_size;
        match std::mem::replace(&mut self.body, BodyState::Taken) {
            BodyState::Read(bytes) => {
                self.body = BodyState::Read(bytes.clone());
                Ok(bytes)
            }
            BodyState::TooLarge => {
                self.body = BodyState::TooLarge;
                Err(TransportError::BodyTooLarge { limit })
            }
            BodyState::Failed(msg) => {
                self.body = BodyState::Failed(msg.clone());
                Err(TransportError::BodyRead(msg))
            }
            BodyState::Taken => Ok(Bytes::new()),
            BodyState::Pending(body) => {
                if self.declared_length().is_some_and(|len| len > limit) {
                    self.body = BodyState::TooLarge;
                    return Err(TransportError::BodyTooLarge { limit });
                }

                match Limited::new(body, limit).collect().await {
                    Ok(collected) => {
                        let bytes = collected.to_bytes();
                        self.body = BodyState::Read(bytes.clone());
                        Ok(bytes)
                    }
                    Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                        self.body = BodyState::TooLarge;
                        Err(TransportError::BodyTooLarge { limit })
                    }
                    Err(e) => {
                        self.body = BodyState::Failed(e.to_string());
                        Err(TransportError::BodyRead(e.to_string()))
                    }
                }
            }
        }
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

/// Buffered `EngineResponse` converted into an `http::Response` on completion
pub struct HyperResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
    finished: bool,
    cancellation: CancellationToken,
}

impl HyperResponse {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            finished: false,
            cancellation,
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[async_trait]
impl EngineResponse for HyperResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) -> std::result::Result<(), TransportError> {
        if self.body.is_some() {
            return Err(TransportError::AlreadyWritten);
        }
        self.status = status;
        Ok(())
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_body(&mut self, body: Bytes) -> std::result::Result<(), TransportError> {
        if self.cancellation.is_cancelled() {
            return Err(TransportError::ResponseClosed);
        }
        if self.body.is_some() {
            return Err(TransportError::AlreadyWritten);
        }
        self.body = Some(body);
        Ok(())
    }

    fn is_written(&self) -> bool {
        self.body.is_some()
    }

    fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    async fn finish(&mut self) -> std::result::Result<(), TransportError> {
        let length = self.body.as_ref().map(Bytes::len).unwrap_or(0);
        self.headers
            .insert(http::header::CONTENT_LENGTH, http::HeaderValue::from(length));
        self.finished = true;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Engine serving a [`Router`] over hyper's HTTP/1.1 connection handling
#[derive(Clone)]
pub struct HyperEngine {
    router: Arc<Router>,
}

impl HyperEngine {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serve one in-process request
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.handle_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Serve one request that is abandoned when `cancellation` fires
    pub async fn handle_with_cancellation<B>(
        &self,
        request: Request<B>,
        cancellation: CancellationToken,
    ) -> Response<Full<Bytes>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let max_body_size = self.router.config().max_body_size;
        let mut engine_request =
            HyperRequest::with_cancellation(request, max_body_size, cancellation.clone());
        let mut engine_response = HyperResponse::new(cancellation);

        self.router
            .dispatch(&mut engine_request, &mut engine_response)
            .await;

        engine_response.into_response()
    }

    /// Bind the configured address and serve until an accept error
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.router.config().bind_address).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("HTTP server listening on {}", local_addr);
        for (method, path) in self.router.routes() {
            info!("  {} {}", method, path);
        }

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("New connection from {}", peer_addr);

            let engine = self.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let engine = engine.clone();
                    async move {
                        let cancellation = CancellationToken::new();
                        // Dropped with the connection future when the client disconnects
                        let guard = cancellation.clone().drop_guard();
                        let response = engine.handle_with_cancellation(req, cancellation).await;
                        guard.disarm();
                        Ok::<_, hyper::Error>(response)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    if err.is_incomplete_message() {
                        debug!("Client disconnected: {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}

#[async_trait]
impl ServerEngine for HyperEngine {
    fn name(&self) -> &'static str {
        "hyper"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn ready(&self) -> std::result::Result<(), TransportError> {
        Ok(())
    }
}
