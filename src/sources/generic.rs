//! Configurable JSON API source
//!
//! One `GenericApiSource` per configured service. A fetch expands the
//! query template, authenticates, calls the API and normalizes whatever
//! JSON comes back using the service's extraction paths. Every failure is
//! folded into a one-item diagnostic response.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::{SearchQuery, Source, SourceMetadata};
use crate::auth::{Authenticator, TokenCache};
use crate::error::{AggregatorError, Result};
use crate::http_client::{form_encode, Transport};
use crate::json_path;
use crate::metrics::{self, FetchTimer};
use crate::normalizer::Normalizer;
use crate::processors::{self, PostProcessor};
use crate::schemas::{AggregatedResponse, AggregatedResult, ServiceDefinition};

/// Title of the result produced when the item path matches nothing usable
pub const NO_DATA_TITLE: &str = "No data array found";

pub struct GenericApiSource {
    definition: Arc<ServiceDefinition>,
    transport: Arc<dyn Transport>,
    authenticator: Authenticator,
    post_processor: Option<Arc<dyn PostProcessor>>,
    metadata: SourceMetadata,
    fetch_timeout: Option<Duration>,
}

impl GenericApiSource {
    /// Creates a source, resolving the configured post-processor once
    pub fn new(definition: ServiceDefinition, transport: Arc<dyn Transport>) -> Self {
        let post_processor = definition.post_processor_name().and_then(|name| {
            let processor = processors::lookup(name);
            match &processor {
                Some(p) => info!(
                    service = %definition.name,
                    processor = p.name(),
                    "Post-processor resolved"
                ),
                None => warn!(
                    service = %definition.name,
                    processor = name,
                    "Post-processor not found, results will not be post-processed"
                ),
            }
            processor
        });

        let authenticator = Authenticator::new(&definition, None);
        let metadata = SourceMetadata {
            name: definition.name.clone(),
            base_url: definition.base_url.clone(),
            auth_type: authenticator.strategy().auth_type(),
            post_processor: post_processor.as_ref().map(|p| p.name().to_string()),
        };

        Self {
            definition: Arc::new(definition),
            transport,
            authenticator,
            post_processor,
            metadata,
            fetch_timeout: None,
        }
    }

    /// Shares a token cache (used only if the service sets `cache_token`)
    pub fn with_token_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.authenticator = Authenticator::new(&self.definition, Some(cache));
        self
    }

    /// Upper bound for authentication, request and body download combined
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn post_processor(&self) -> Option<&Arc<dyn PostProcessor>> {
        self.post_processor.as_ref()
    }

    /// Expands the query template and joins it to the base URL
    pub fn build_url(&self, query: &SearchQuery) -> String {
        let def = &self.definition;

        let expanded = expand_template(&def.query_template, |token| match token {
            "keyword" => Some(form_encode(&query.keyword)),
            "count" => Some(query.count.to_string()),
            "page" => Some(query.page.to_string()),
            "offset" => Some(query.offset().to_string()),
            "sortBy" => Some(form_encode(&query.sort_by)),
            "fromDate" => Some(
                query
                    .from_date
                    .unwrap_or_else(|| Utc::now().date_naive())
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
            "apiKey" => Some(def.api_key.clone().unwrap_or_default()),
            "clientId" => Some(def.client_id.clone().unwrap_or_default()),
            "clientSecret" => Some(def.client_secret.clone().unwrap_or_default()),
            _ => None,
        });

        format!("{}{}", def.base_url.trim_end_matches('/'), expanded)
    }

    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>> {
        let builder = self.transport.client().get(url);
        let request = self
            .authenticator
            .authorize(self.transport.as_ref(), builder)
            .await
            .build()?;

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(AggregatorError::ApiError { code, message }) => {
                if code.starts_with(StatusCode::UNAUTHORIZED.as_str()) {
                    self.authenticator.reject_token();
                }
                return Err(AggregatorError::ApiError { code, message });
            }
            Err(e) => return Err(e),
        };
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_body_with_timeout(&self, url: &str) -> Result<Vec<u8>> {
        match self.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetch_body(url))
                .await
                .unwrap_or_else(|_| {
                    Err(AggregatorError::Timeout(format!(
                        "no response within {:.1}s",
                        limit.as_secs_f64()
                    )))
                }),
            None => self.fetch_body(url).await,
        }
    }

    /// Builds the response for a parsed document
    pub fn parse_document(&self, document: &Value, keyword: &str) -> AggregatedResponse {
        self.parse_document_with_outcome(document, keyword).0
    }

    fn parse_document_with_outcome(&self, document: &Value, keyword: &str) -> (AggregatedResponse, &'static str) {
        let def = &self.definition;
        let normalizer = Normalizer::new(def);

        let (results, outcome) = match def.item_path() {
            None => {
                debug!(service = %def.name, "No item path, treating root as a single result");
                (vec![self.build_result(&normalizer, document, keyword)], metrics::OUTCOME_SUCCESS)
            }
            Some(path) => match json_path::resolve(document, path) {
                Some(Value::Array(items)) => {
                    let results: Vec<AggregatedResult> = items
                        .iter()
                        .map(|item| self.build_result(&normalizer, item, keyword))
                        .collect();
                    (results, metrics::OUTCOME_SUCCESS)
                }
                Some(item) if item.is_object() => {
                    debug!(service = %def.name, item_path = path, "Item path points to an object, wrapping it");
                    (vec![self.build_result(&normalizer, item, keyword)], metrics::OUTCOME_SUCCESS)
                }
                other => {
                    let found = describe(other);
                    warn!(
                        service = %def.name,
                        item_path = path,
                        found = found,
                        "Expected array or object at item path"
                    );
                    let result = AggregatedResult::degraded(
                        &def.name,
                        NO_DATA_TITLE,
                        format!("Expected array or object at path '{}', but got {}.", path, found),
                        &def.base_url,
                    );
                    (vec![result], metrics::OUTCOME_NO_DATA)
                }
            },
        };

        let total_count = json_path::resolve_number(document, def.total_count_path.as_deref())
            .unwrap_or(results.len() as i64);

        (AggregatedResponse::new(results, total_count), outcome)
    }

    fn build_result(&self, normalizer: &Normalizer<'_>, item: &Value, keyword: &str) -> AggregatedResult {
        let result = normalizer.normalize(item, keyword);
        match &self.post_processor {
            Some(processor) => {
                trace!(service = %self.definition.name, processor = processor.name(), "Applying post-processor");
                processor.process(result, item, keyword)
            }
            None => result,
        }
    }

    fn fetch_failed(&self, error: &AggregatorError) -> AggregatedResponse {
        let def = &self.definition;
        warn!(service = %def.name, error = %error, kind = error.kind(), "Failed to fetch data");
        AggregatedResponse::failure(AggregatedResult::degraded(
            &def.name,
            format!("Error fetching {}", def.name),
            error.to_string(),
            &def.base_url,
        ))
    }

    fn parse_failed(&self, error: &serde_json::Error) -> AggregatedResponse {
        let def = &self.definition;
        warn!(service = %def.name, error = %error, "Response is not valid JSON");
        AggregatedResponse::failure(AggregatedResult::degraded(
            &def.name,
            format!("Error parsing {}", def.name),
            error.to_string(),
            "",
        ))
    }
}

#[async_trait]
impl Source for GenericApiSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn fetch(&self, query: &SearchQuery) -> AggregatedResponse {
        let service = self.definition.name.as_str();
        let _timer = FetchTimer::new(service);

        let url = self.build_url(query);
        info!(service = %service, keyword = %query.keyword, page = query.page, "Fetching service");
        debug!(service = %service, url = %url, "Requesting URL");

        let body = match self.fetch_body_with_timeout(&url).await {
            Ok(body) => body,
            Err(e) => {
                let response = self.fetch_failed(&e);
                metrics::record_fetch(service, metrics::OUTCOME_FETCH_ERROR, response.len());
                return response;
            }
        };

        let document: Value = match serde_json::from_slice(&body) {
            Ok(document) => document,
            Err(e) => {
                let response = self.parse_failed(&e);
                metrics::record_fetch(service, metrics::OUTCOME_PARSE_ERROR, response.len());
                return response;
            }
        };
        trace!(service = %service, body = %document, "Raw response");

        let (response, outcome) = self.parse_document_with_outcome(&document, &query.keyword);
        metrics::record_fetch(service, outcome, response.len());

        info!(
            service = %service,
            results = response.len(),
            total = response.total_count,
            "Fetched results"
        );

        response
    }
}

/// Replaces `{token}` placeholders known to `lookup`; unknown ones stay literal
fn expand_template(template: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];

        match candidate.find('}').and_then(|close| lookup(&candidate[1..close]).map(|v| (close, v))) {
            Some((close, value)) => {
                out.push_str(&value);
                rest = &candidate[close + 1..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn describe(value: Option<&Value>) -> &'static str {
    match value {
        None => "nothing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "a boolean",
        Some(Value::Number(_)) => "a number",
        Some(Value::String(_)) => "a string",
        Some(Value::Array(_)) => "an array",
        Some(Value::Object(_)) => "an object",
    }
}
