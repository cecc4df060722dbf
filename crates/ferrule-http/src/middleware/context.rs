//! Request context handed to middleware

use serde_json::{Map, Value};

use crate::engine::EngineRequest;

/// Engine-neutral view of the in-flight request plus middleware metadata
///
/// Metadata added here travels with the request and is delivered to contract
/// handlers as `RpcInput::metadata`.
pub struct RequestContext<'a> {
    request: &'a mut dyn EngineRequest,
    metadata: Map<String, Value>,
}

impl<'a> RequestContext<'a> {
    pub fn new(request: &'a mut dyn EngineRequest) -> Self {
        Self {
            request,
            metadata: Map::new(),
        }
    }

    pub fn method(&self) -> &http::Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn headers(&self) -> &http::HeaderMap {
        self.request.headers()
    }

    /// Header value as text, if present and visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Underlying request, e.g. for body parsing
    pub fn request_mut(&mut self) -> &mut dyn EngineRequest {
        &mut *self.request
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn into_metadata(self) -> Map<String, Value> {
        self.metadata
    }
}
