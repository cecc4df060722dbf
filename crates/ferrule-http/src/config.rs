//! Server configuration

use std::net::SocketAddr;

use crate::cors::CorsConfig;

/// Configuration shared by the router and every engine
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the hyper engine binds to
    pub bind_address: SocketAddr,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable CORS header injection and preflight handling
    pub enable_cors: bool,
    /// CORS policy applied when `enable_cors` is set
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: true,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    pub fn cors_config(mut self, cors: CorsConfig) -> Self {
        self.enable_cors = true;
        self.cors = cors;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), 8000);
        assert!(config.enable_cors);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_server_config_customization() {
        let addr: SocketAddr = "0.0.0.0:3000".parse().unwrap();
        let config = ServerConfig::default()
            .bind_address(addr)
            .max_body_size(2048)
            .cors(false);

        assert_eq!(config.bind_address, addr);
        assert_eq!(config.max_body_size, 2048);
        assert!(!config.enable_cors);

        let config = config.cors_config(CorsConfig::for_origins(vec![
            "https://example.com".to_string(),
        ]));
        assert!(config.enable_cors);
        assert_eq!(config.cors.allowed_origins, vec!["https://example.com"]);
    }
}
