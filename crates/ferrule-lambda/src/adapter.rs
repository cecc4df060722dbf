//! Adapters between `lambda_http` requests/responses and the engine traits
//!
//! Lambda delivers the whole body up front, so reading it never blocks; the
//! size limit is still enforced so both engines reject the same requests.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use lambda_http::{Body as LambdaBody, Request as LambdaRequest, Response as LambdaResponse};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ferrule_http::{EngineRequest, EngineResponse, TransportError};

/// `EngineRequest` over a Lambda invocation
pub struct LambdaRequestAdapter {
    parts: http::request::Parts,
    /// `Err` holds the reason an unsupported body could not be read
    body: Result<Bytes, String>,
    parsed: Option<Value>,
    max_body_size: usize,
    cancellation: CancellationToken,
}

impl LambdaRequestAdapter {
    pub fn new(
        request: LambdaRequest,
        max_body_size: usize,
        cancellation: CancellationToken,
    ) -> Self {
        let (parts, body) = request.into_parts();
        let body = body_bytes(body);
        match &body {
            Ok(bytes) => debug!(
                "Adapted Lambda request: {} {} ({} bytes)",
                parts.method,
                parts.uri,
                bytes.len()
            ),
            Err(reason) => warn!(
                "Lambda request {} {} has an unreadable body: {}",
                parts.method, parts.uri, reason
            ),
        }
        Self::from_parts(parts, body, max_body_size, cancellation)
    }

    fn from_parts(
        parts: http::request::Parts,
        body: Result<Bytes, String>,
        max_body_size: usize,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            parts,
            body,
            parsed: None,
            max_body_size,
            cancellation,
        }
    }
}

/// Flatten a Lambda body into bytes
///
/// A body variant this adapter does not know is an error, never an empty body.
pub fn body_bytes(body: LambdaBody) -> Result<Bytes, String> {
    match body {
        LambdaBody::Empty => Ok(Bytes::new()),
        LambdaBody::Text(s) => Ok(Bytes::from(s)),
        LambdaBody::Binary(b) => Ok(Bytes::from(b)),
        other => Err(format!("unsupported Lambda body variant: {:?}", other)),
    }
}

#[async_trait]
impl EngineRequest for LambdaRequestAdapter {
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

    async fn read_body(&mut self) -> Result<Bytes, TransportError> {
        let body = self
            .body
            .as_ref()
            .map_err(|reason| TransportError::BodyRead(reason.clone()))?;
        if body.len() > self.max_body_size {
            return Err(TransportError::BodyTooLarge {
                limit: self.max_body_size,
            });
        }
        Ok(body.clone())
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

/// `EngineResponse` that produces a `lambda_http::Response` once finished
pub struct LambdaResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
    lambda_body: Option<LambdaBody>,
    cancellation: CancellationToken,
}

impl LambdaResponseWriter {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            lambda_body: None,
            cancellation,
        }
    }

    /// Build the Lambda response; unfinished writers yield whatever was written
    pub fn into_response(self) -> LambdaResponse<LambdaBody> {
        let body = match self.lambda_body {
            Some(body) => body,
            None => to_lambda_body(self.body.unwrap_or_default()),
        };
        let mut response = LambdaResponse::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Text when the bytes are UTF-8, binary otherwise
fn to_lambda_body(bytes: Bytes) -> LambdaBody {
    if bytes.is_empty() {
        return LambdaBody::Empty;
    }
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => LambdaBody::Text(text),
        Err(_) => LambdaBody::Binary(bytes.to_vec()),
    }
}

#[async_trait]
impl EngineResponse for LambdaResponseWriter {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) -> Result<(), TransportError> {
        if self.lambda_body.is_some() || self.body.is_some() {
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

    fn write_body(&mut self, body: Bytes) -> Result<(), TransportError> {
        if self.cancellation.is_cancelled() {
            return Err(TransportError::ResponseClosed);
        }
        if self.body.is_some() || self.lambda_body.is_some() {
            return Err(TransportError::AlreadyWritten);
        }
        self.body = Some(body);
        Ok(())
    }

    fn is_written(&self) -> bool {
        self.body.is_some() || self.lambda_body.is_some()
    }

    fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    async fn finish(&mut self) -> Result<(), TransportError> {
        let bytes = self.body.take().unwrap_or_default();
        self.lambda_body = Some(to_lambda_body(bytes));
        debug!("Finished Lambda response (status: {})", self.status);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.lambda_body.is_some()
    }
}
