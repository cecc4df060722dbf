//! CORS (Cross-Origin Resource Sharing) support
//!
//! The router applies these headers before any middleware or route runs, so
//! they are present on every response including errors.

use std::collections::HashSet;

use http::header::{self, HeaderMap, HeaderValue};
use http::Method;
use tracing::{debug, warn};

use crate::HttpError;

/// CORS policy
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows all
    pub allowed_origins: Vec<String>,

    /// Allowed HTTP methods
    pub allowed_methods: Vec<Method>,

    /// Allowed request headers
    pub allowed_headers: Vec<String>,

    /// Whether to allow credentials (cookies, authorization headers)
    pub allow_credentials: bool,

    /// Maximum age for preflight cache (in seconds)
    pub max_age: Option<u32>,

    /// Headers to expose to the client
    pub expose_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Accept".to_string(),
                "Authorization".to_string(),
            ],
            allow_credentials: false,
            max_age: Some(86400), // 24 hours
            expose_headers: vec!["X-Request-Id".to_string()],
        }
    }
}

impl CorsConfig {
    /// Allow all origins (for development)
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn for_origins(origins: Vec<String>) -> Self {
        Self {
            allowed_origins: origins,
            ..Default::default()
        }
    }

    /// Read `FERRULE_CORS_ORIGINS`, `FERRULE_CORS_CREDENTIALS` and `FERRULE_CORS_MAX_AGE`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let allowed_origins = std::env::var("FERRULE_CORS_ORIGINS")
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or(defaults.allowed_origins);

        let allow_credentials = std::env::var("FERRULE_CORS_CREDENTIALS")
            .map(|s| s.parse().unwrap_or(false))
            .unwrap_or(false);

        let max_age = std::env::var("FERRULE_CORS_MAX_AGE")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(defaults.max_age);

        Self {
            allowed_origins,
            allow_credentials,
            max_age,
            ..Default::default()
        }
    }

    /// Reject policies browsers would refuse or that cannot be encoded
    pub fn validate(&self) -> Result<(), HttpError> {
        if self.allow_credentials && self.allows_any_origin() {
            return Err(HttpError::Cors(
                "Cannot use wildcard origin (*) with credentials enabled".to_string(),
            ));
        }

        for origin in &self.allowed_origins {
            if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://")
            {
                return Err(HttpError::Cors(format!("Invalid origin format: {}", origin)));
            }
        }

        let headers_set: HashSet<_> = self
            .allowed_headers
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        if headers_set.len() != self.allowed_headers.len() {
            return Err(HttpError::Cors(
                "Duplicate headers in allowed_headers".to_string(),
            ));
        }

        Ok(())
    }

    fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    fn allowed_origin(&self, request_origin: Option<&str>) -> Option<String> {
        if self.allows_any_origin() {
            return Some("*".to_string());
        }

        let request_origin = request_origin?;
        self.allowed_origins
            .iter()
            .find(|o| o.as_str() == request_origin)
            .cloned()
    }

    /// Headers for a simple (non-preflight) response
    pub fn apply(&self, headers: &mut HeaderMap, request_origin: Option<&str>) {
        let Some(origin) = self.allowed_origin(request_origin) else {
            debug!("Origin {:?} not allowed, skipping CORS headers", request_origin);
            return;
        };

        if origin != "*" {
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        insert(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, &origin);

        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }

        if !self.expose_headers.is_empty() {
            insert(
                headers,
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                &self.expose_headers.join(", "),
            );
        }
    }

    /// Headers for an `OPTIONS` preflight response
    pub fn apply_preflight(&self, headers: &mut HeaderMap, request_origin: Option<&str>) {
        self.apply(headers, request_origin);

        let methods = self
            .allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        insert(headers, header::ACCESS_CONTROL_ALLOW_METHODS, &methods);

        if !self.allowed_headers.is_empty() {
            insert(
                headers,
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                &self.allowed_headers.join(", "),
            );
        }

        if let Some(max_age) = self.max_age {
            insert(headers, header::ACCESS_CONTROL_MAX_AGE, &max_age.to_string());
        }
    }
}

fn insert(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => warn!("Skipping CORS header {}: {}", name, e),
    }
}
