//! HTTP Client Module
//!
//! Provides the transport used by every service:
//! - Semaphore-based concurrency limiting
//! - Request and connect timeouts
//! - Exponential backoff for transient failures
//!
//! Services receive the transport as an `Arc<dyn Transport>` so tests can
//! swap in their own implementation.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::{Client, Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{AggregatorError, Result};

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Sends fully built requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Client used to build requests
    fn client(&self) -> &Client;

    /// Executes a request; non-success statuses are errors
    async fn execute(&self, request: Request) -> Result<Response>;
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum concurrent requests across all services
    pub max_concurrent_requests: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum retries for transient failures
    pub max_retries: u32,
    /// Initial retry delay
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// Retry multiplier for exponential backoff
    pub retry_multiplier: f64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 2,
            initial_retry_delay: Duration::from_millis(250),
            max_retry_delay: Duration::from_secs(5),
            retry_multiplier: 2.0,
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("AgileAggregator/{}", env!("CARGO_PKG_VERSION"))
}

/// Resilient HTTP client with concurrency limiting and retries
pub struct ResilientHttpClient {
    /// Inner reqwest client
    client: Client,
    /// Global concurrency semaphore
    semaphore: Arc<Semaphore>,
    /// Configuration
    config: HttpClientConfig,
}

impl ResilientHttpClient {
    /// Creates a new resilient HTTP client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));

        Ok(Self {
            client,
            semaphore,
            config,
        })
    }

    /// Creates a client with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Creates an exponential backoff with jitter
    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_retry_delay)
            .with_max_interval(self.config.max_retry_delay)
            .with_multiplier(self.config.retry_multiplier)
            .with_randomization_factor(0.5) // Jitter: +/- 50%
            .with_max_elapsed_time(Some(self.config.request_timeout * 2))
            .build();
        backoff.reset();
        backoff
    }

    /// Checks if a status code should trigger a retry
    fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS |     // 429
            StatusCode::SERVICE_UNAVAILABLE |   // 503
            StatusCode::GATEWAY_TIMEOUT |       // 504
            StatusCode::BAD_GATEWAY |           // 502
            StatusCode::REQUEST_TIMEOUT         // 408
        )
    }

    /// Converts a non-success response into an error carrying the status and body
    async fn status_error(response: Response) -> AggregatorError {
        let code = response.status().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
        AggregatorError::ApiError { code, message }
    }

    fn transport_error(error: reqwest::Error) -> AggregatorError {
        if error.is_timeout() {
            AggregatorError::Timeout(error.to_string())
        } else {
            AggregatorError::HttpError(error)
        }
    }

    /// Gets the number of available permits
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl Transport for ResilientHttpClient {
    fn client(&self) -> &Client {
        &self.client
    }

    /// Executes a request with retry logic (exponential backoff + jitter)
    async fn execute(&self, request: Request) -> Result<Response> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| AggregatorError::ConnectionLost("Semaphore closed".to_string()))?;

        debug!(
            method = %request.method(),
            url = %request.url(),
            "Executing HTTP request"
        );

        let max_retries = self.config.max_retries;
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;
        let mut current = request;

        loop {
            attempt += 1;
            // Streaming bodies can't be cloned; those requests get a single attempt
            let retry = (attempt <= max_retries).then(|| current.try_clone()).flatten();

            let outcome = match self.client.execute(current).await {
                Ok(response) if response.status().is_success() => {
                    debug!(status = %response.status(), attempt, "Request succeeded");
                    return Ok(response);
                }
                other => other,
            };

            let transient = match &outcome {
                Ok(response) => Self::is_retryable_status(response.status()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if transient {
                if let (Some(next), Some(delay)) = (retry, backoff.next_backoff()) {
                    let reason = match &outcome {
                        Ok(response) => response.status().to_string(),
                        Err(e) => e.to_string(),
                    };
                    warn!(
                        reason = %reason,
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    current = next;
                    continue;
                }
            }

            return match outcome {
                Ok(response) => Err(Self::status_error(response).await),
                Err(e) => Err(Self::transport_error(e)),
            };
        }
    }
}

/// Form-encodes a query value (`application/x-www-form-urlencoded`, spaces become `+`)
pub fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HttpClientConfig::default();
        assert_eq!(config.max_concurrent_requests, 10);
        assert_eq!(config.max_retries, 2);
        assert!(config.user_agent.starts_with("AgileAggregator/"));
    }

    #[tokio::test]
    async fn test_semaphore_limiting() {
        let config = HttpClientConfig {
            max_concurrent_requests: 2,
            ..Default::default()
        };

        let client = ResilientHttpClient::new(config).unwrap();

        assert_eq!(client.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_allows_requests() {
        let config = HttpClientConfig {
            max_concurrent_requests: 0,
            ..Default::default()
        };

        let client = ResilientHttpClient::new(config).unwrap();

        assert_eq!(client.available_permits(), 1);
    }

    #[test]
    fn test_retryable_status() {
        assert!(ResilientHttpClient::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(ResilientHttpClient::is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!ResilientHttpClient::is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!ResilientHttpClient::is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!ResilientHttpClient::is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_form_encode() {
        assert_eq!(form_encode("New York"), "New+York");
        assert_eq!(form_encode("a&b=c"), "a%26b%3Dc");
        assert_eq!(form_encode("publishedAt"), "publishedAt");
        assert_eq!(form_encode("Αθήνα"), "%CE%91%CE%B8%CE%AE%CE%BD%CE%B1");
    }
}
