//! Engine-neutral request normalization
//!
//! Every engine's request ends up as the same [`NormalizedRequest`], so the
//! validation pipeline never branches on the engine.

use http::{HeaderMap, Method};
use serde_json::{Map, Value};

use crate::engine::{EngineRequest, TransportError};

/// Request with method, path, params, query, headers and body resolved
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub method: Method,
    pub path: String,
    pub path_params: Map<String, Value>,
    pub query: Map<String, Value>,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Normalize an engine request
///
/// A body parsed by upstream middleware takes precedence over the raw bytes.
pub async fn normalize(
    request: &mut dyn EngineRequest,
    path_params: Map<String, Value>,
) -> Result<NormalizedRequest, TransportError> {
    let body = match request.parsed_body() {
        Some(parsed) => parsed.clone(),
        None => {
            let bytes = request.read_body().await?;
            decode_body(&bytes)?
        }
    };

    Ok(NormalizedRequest {
        method: uppercase_method(request.method()),
        path: request.uri().path().to_string(),
        path_params,
        query: parse_query(request.uri().query()),
        headers: request.headers().clone(),
        body,
    })
}

/// Methods are matched and handed to handlers in upper case
pub(crate) fn uppercase_method(method: &Method) -> Method {
    let upper = method.as_str().to_ascii_uppercase();
    Method::from_bytes(upper.as_bytes()).unwrap_or_else(|_| method.clone())
}

/// Decode raw body bytes: empty is `null`, JSON if it parses, text otherwise
pub fn decode_body(bytes: &[u8]) -> Result<Value, TransportError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    let text = std::str::from_utf8(bytes).map_err(|_| TransportError::InvalidUtf8)?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

/// Parse a query string; repeated keys collect into an array
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut params = Map::new();
    let Some(query) = query else {
        return params;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.get_mut(key.as_ref()) {
            None => {
                params.insert(key.into_owned(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::HyperRequest;
    use bytes::Bytes;
    use http_body_util::Full;
    use serde_json::json;

    #[test]
    fn test_parse_query() {
        let query = parse_query(Some("name=world&tag=a&tag=b&tag=c&greeting=hi%20there"));
        assert_eq!(query["name"], "world");
        assert_eq!(query["tag"], json!(["a", "b", "c"]));
        assert_eq!(query["greeting"], "hi there");

        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b"").unwrap(), Value::Null);
        assert_eq!(decode_body(b"  \n").unwrap(), Value::Null);
        assert_eq!(decode_body(br#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(decode_body(b"plain text").unwrap(), json!("plain text"));
        assert!(matches!(
            decode_body(&[0xff, 0xfe]),
            Err(TransportError::InvalidUtf8)
        ));
    }

    #[tokio::test]
    async fn test_normalize_prefers_parsed_body() {
        let req = http::Request::builder()
            .method("post")
            .uri("/users/42?verbose=true")
            .body(Full::new(Bytes::from_static(b"{\"raw\":true}")))
            .unwrap();
        let mut req = HyperRequest::new(req, 1024);
        req.set_parsed_body(json!({"parsed": true}));

        let mut params = Map::new();
        params.insert("id".to_string(), json!("42"));

        let normalized = normalize(&mut req, params).await.unwrap();
        assert_eq!(normalized.method, Method::POST);
        assert_eq!(normalized.path, "/users/42");
        assert_eq!(normalized.path_params["id"], "42");
        assert_eq!(normalized.query["verbose"], "true");
        assert_eq!(normalized.body, json!({"parsed": true}));
    }

    #[tokio::test]
    async fn test_normalize_reads_raw_body() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/hello")
            .body(Full::new(Bytes::from_static(b"{\"name\":\"world\"}")))
            .unwrap();
        let mut req = HyperRequest::new(req, 1024);

        let normalized = normalize(&mut req, Map::new()).await.unwrap();
        assert_eq!(normalized.body, json!({"name": "world"}));
        assert!(normalized.query.is_empty());
    }
}
