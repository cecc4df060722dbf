//! Capability surface shared by every underlying server engine
//!
//! The router, middleware and pipeline only ever see `dyn EngineRequest` and
//! `dyn EngineResponse`. Each engine wraps its native request/response objects
//! in one adapter struct per direction.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Errors reading from or writing to the underlying engine
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("request body is not valid UTF-8")]
    InvalidUtf8,

    #[error("response is closed")]
    ResponseClosed,

    #[error("response body was already written")]
    AlreadyWritten,

    #[error("engine not ready: {0}")]
    NotReady(String),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    #[error("Hyper error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether the failure happened while reading the inbound request
    pub fn is_read_error(&self) -> bool {
        matches!(
            self,
            Self::BodyRead(_) | Self::BodyTooLarge { .. } | Self::InvalidUtf8
        )
    }
}

/// Inbound request as seen through any engine
#[async_trait]
pub trait EngineRequest: Send {
    fn method(&self) -> &Method;

    fn uri(&self) -> &Uri;

    fn headers(&self) -> &HeaderMap;

    /// Body already parsed by a body-parsing middleware, if one ran
    fn parsed_body(&self) -> Option<&Value>;

    fn set_parsed_body(&mut self, body: Value);

    /// Raw body bytes; repeated calls return the same bytes
    async fn read_body(&mut self) -> Result<Bytes, TransportError>;

    /// Cancelled when the engine abandons the request (client gone, shutdown)
    fn cancellation(&self) -> CancellationToken;
}

/// Outbound response as seen through any engine
///
/// Headers may be set at any point before [`EngineResponse::finish`]; the body
/// may be written once.
#[async_trait]
pub trait EngineResponse: Send {
    fn status(&self) -> StatusCode;

    fn set_status(&mut self, status: StatusCode) -> Result<(), TransportError>;

    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_body(&mut self, body: Bytes) -> Result<(), TransportError>;

    fn is_written(&self) -> bool;

    /// The peer is gone; nothing written now will be delivered
    fn is_closed(&self) -> bool;

    /// Engine-specific finalization (content length, flush, ready signals)
    async fn finish(&mut self) -> Result<(), TransportError>;

    fn is_finished(&self) -> bool;
}

/// Lifecycle of an engine
#[async_trait]
pub trait ServerEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_ready(&self) -> bool;

    /// Complete initialization; engines that are ready at construction return at once
    async fn ready(&self) -> Result<(), TransportError>;
}

/// Write a complete JSON response unless the peer is gone
///
/// Existing headers are kept; `content-type` is only set when absent.
pub fn write_json(
    response: &mut dyn EngineResponse,
    status: StatusCode,
    body: &Value,
) -> Result<(), TransportError> {
    if response.is_closed() {
        return Err(TransportError::ResponseClosed);
    }
    response.set_status(status)?;

    let bytes = if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        Bytes::new()
    } else {
        if !response.headers().contains_key(http::header::CONTENT_TYPE) {
            response.headers_mut().insert(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );
        }
        Bytes::from(serde_json::to_vec(body)?)
    };

    response.write_body(bytes)
}
