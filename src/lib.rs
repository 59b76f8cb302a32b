//! API Aggregator
//!
//! Searches a set of independently configured HTTP/JSON APIs for a keyword
//! and normalizes their results into one shape.
//!
//! Features:
//! - Per-service query templates, authentication and extraction paths
//! - Minimal JSON path language (`data.items`, `weather[0].icon`)
//! - Pluggable post-processors resolved by name at load time
//! - API key and OAuth2 client-credentials authentication
//! - Failures degrade into diagnostic results instead of errors
//! - Concurrency limiting, timeouts and retry with backoff
//! - Prometheus metrics per service

pub mod aggregator;
pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod json_path;
pub mod metrics;
pub mod normalizer;
pub mod processors;
pub mod schemas;
pub mod sources;

pub use aggregator::{Aggregator, ServiceResponse};
pub use error::{AggregatorError, Result};
pub use schemas::{AggregatedResponse, AggregatedResult, AuthType, ServiceDefinition};
pub use sources::{GenericApiSource, SearchQuery, Source};
