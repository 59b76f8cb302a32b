//! Error types for the API aggregator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("API error: {code} - {message}")]
    ApiError {
        code: String,
        message: String,
    },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid service definition: {0}")]
    ValidationError(String),

    #[error("Service not configured: {0}")]
    ServiceNotConfigured(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl AggregatorError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpError(_) => "http",
            Self::JsonError(_) => "json",
            Self::ConfigError(_) => "config",
            Self::ApiError { .. } => "api_status",
            Self::Timeout(_) => "timeout",
            Self::ConnectionLost(_) => "connection",
            Self::ValidationError(_) => "validation",
            Self::ServiceNotConfigured(_) => "not_configured",
            Self::ParseError(_) => "parse",
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
