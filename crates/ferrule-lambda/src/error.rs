//! Error handling for the Lambda engine

use thiserror::Error;

/// Result type for Lambda engine operations
pub type Result<T> = std::result::Result<T, LambdaError>;

/// Errors that can occur while serving through Lambda
#[derive(Error, Debug)]
pub enum LambdaError {
    /// HTTP error while building a response
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// Lambda HTTP error
    #[error("Lambda HTTP error: {0}")]
    LambdaHttp(#[from] lambda_http::Error),

    /// Engine failed to become ready
    #[error("Transport error: {0}")]
    Transport(#[from] ferrule_http::TransportError),

    /// Router or module configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ferrule_contract::ConfigError),

    /// CORS configuration error
    #[error("CORS error: {0}")]
    Cors(String),
}

impl From<ferrule_http::HttpError> for LambdaError {
    fn from(err: ferrule_http::HttpError) -> Self {
        match err {
            ferrule_http::HttpError::Config(e) => LambdaError::Config(e),
            ferrule_http::HttpError::Transport(e) => LambdaError::Transport(e),
            ferrule_http::HttpError::Cors(msg) => LambdaError::Cors(msg),
            other => LambdaError::Transport(ferrule_http::TransportError::NotReady(
                other.to_string(),
            )),
        }
    }
}
