//! Multi-service aggregation
//!
//! Owns one `GenericApiSource` per enabled service and searches them
//! concurrently. Responses come back in configuration order.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::auth::TokenCache;
use crate::config::Config;
use crate::error::{AggregatorError, Result};
use crate::http_client::{ResilientHttpClient, Transport};
use crate::schemas::{AggregatedResponse, ServiceDefinition};
use crate::sources::{GenericApiSource, SearchQuery, Source, SourceMetadata};

/// Response of one service within an aggregated search
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub service: String,
    pub response: AggregatedResponse,
}

pub struct Aggregator {
    sources: Vec<Arc<GenericApiSource>>,
}

impl Aggregator {
    /// Builds the aggregator from runtime configuration and the service catalog
    #[instrument(skip(config), fields(services_file = %config.services_file.display()))]
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(ResilientHttpClient::new(config.http_client_config())?);
        let definitions = config.load_services()?;

        let aggregator = Self::build(definitions, transport, config.fetch_timeout());
        info!(services = aggregator.len(), "Aggregator initialized");
        Ok(aggregator)
    }

    /// Creates a source per definition, all sharing `transport` and a token cache
    pub fn new(definitions: Vec<ServiceDefinition>, transport: Arc<dyn Transport>) -> Self {
        Self::build(definitions, transport, None)
    }

    fn build(
        definitions: Vec<ServiceDefinition>,
        transport: Arc<dyn Transport>,
        fetch_timeout: Option<Duration>,
    ) -> Self {
        let token_cache = Arc::new(TokenCache::new());
        let sources = definitions
            .into_iter()
            .map(|definition| {
                let source = GenericApiSource::new(definition, transport.clone())
                    .with_token_cache(token_cache.clone());
                match fetch_timeout {
                    Some(timeout) => Arc::new(source.with_fetch_timeout(timeout)),
                    None => Arc::new(source),
                }
            })
            .collect();

        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn services(&self) -> Vec<&SourceMetadata> {
        self.sources.iter().map(|s| s.metadata()).collect()
    }

    /// Finds a service by name, ignoring case
    pub fn source(&self, name: &str) -> Option<&Arc<GenericApiSource>> {
        self.sources
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Searches every service concurrently
    #[instrument(skip(self, query), fields(keyword = %query.keyword))]
    pub async fn search_all(&self, query: &SearchQuery) -> Vec<ServiceResponse> {
        let fetches = self.sources.iter().map(|source| async move {
            ServiceResponse {
                service: source.name().to_string(),
                response: source.fetch(query).await,
            }
        });

        let responses = join_all(fetches).await;

        info!(
            services = responses.len(),
            results = responses.iter().map(|r| r.response.len()).sum::<usize>(),
            "Aggregated search completed"
        );

        responses
    }

    /// Searches a single service by name
    pub async fn search_service(&self, name: &str, query: &SearchQuery) -> Result<AggregatedResponse> {
        let source = self
            .source(name)
            .ok_or_else(|| AggregatorError::ServiceNotConfigured(name.to_string()))?;
        Ok(source.fetch(query).await)
    }

    /// Searches `service` if given, otherwise every service
    pub async fn search(&self, service: Option<&str>, query: &SearchQuery) -> Result<Vec<ServiceResponse>> {
        match service {
            Some(name) if !name.eq_ignore_ascii_case("all") => {
                let response = self.search_service(name, query).await?;
                // configured spelling, not the caller's
                let service = self.source(name).map_or(name, |s| s.name()).to_string();
                Ok(vec![ServiceResponse { service, response }])
            }
            _ => Ok(self.search_all(query).await),
        }
    }
}
