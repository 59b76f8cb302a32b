//! Configuration for the API aggregator
//!
//! Runtime settings come from an optional TOML file and `AGGREGATOR__*`
//! style environment variables. Service definitions live in a separate
//! catalog file with one `[[services]]` table per external API.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use validator::Validate;

use crate::error::{AggregatorError, Result};
use crate::http_client::{default_user_agent, HttpClientConfig};
use crate::schemas::ServiceDefinition;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Service catalog
    #[serde(default = "default_services_file")]
    pub services_file: PathBuf,

    // Concurrency
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    // Timeouts (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Whole-fetch deadline; 0 disables it
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    // Retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_services_file() -> PathBuf {
    PathBuf::from("config/services.toml")
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_fetch_timeout() -> u64 {
    45
}

fn default_max_retries() -> u32 {
    2
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Loads `.env`, then `config_file` (or `aggregator.toml` if present), then the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match config_file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("aggregator").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("AGGREGATOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(AggregatorError::ValidationError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(AggregatorError::ValidationError(
                "max_concurrent_requests must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the shared HTTP client
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            max_concurrent_requests: self.max_concurrent_requests,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_retries: self.max_retries,
            user_agent: self.user_agent.clone(),
            ..Default::default()
        }
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }

    /// Loads the enabled services from `services_file`
    pub fn load_services(&self) -> Result<Vec<ServiceDefinition>> {
        load_services(&self.services_file)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceCatalog {
    #[serde(default)]
    services: Vec<ServiceDefinition>,
}

/// Reads a service catalog file (format chosen by extension)
pub fn load_services(path: &Path) -> Result<Vec<ServiceDefinition>> {
    let catalog: ServiceCatalog = config::Config::builder()
        .add_source(config::File::from(path).required(true))
        .build()?
        .try_deserialize()?;

    info!(path = %path.display(), "Service catalog read");
    select_enabled(catalog.services)
}

/// Parses a TOML service catalog
pub fn parse_services_toml(raw: &str) -> Result<Vec<ServiceDefinition>> {
    let catalog: ServiceCatalog = config::Config::builder()
        .add_source(config::File::from_str(raw, config::FileFormat::Toml))
        .build()?
        .try_deserialize()?;

    select_enabled(catalog.services)
}

/// Drops disabled services and validates the rest
fn select_enabled(services: Vec<ServiceDefinition>) -> Result<Vec<ServiceDefinition>> {
    let mut seen = HashSet::new();
    let mut enabled = Vec::new();

    for definition in services {
        if !definition.enabled {
            info!(service = %definition.name, "Service disabled, skipping");
            continue;
        }

        definition.validate().map_err(|e| {
            AggregatorError::ValidationError(format!("service '{}': {}", definition.name, e))
        })?;

        if !seen.insert(definition.name.to_ascii_lowercase()) {
            return Err(AggregatorError::ValidationError(format!(
                "duplicate service name '{}'",
                definition.name
            )));
        }

        if definition.has_unknown_auth_type() {
            warn!(
                service = %definition.name,
                auth_type = ?definition.auth_type,
                "Unknown auth type, requests will be sent unauthenticated"
            );
        }

        info!(
            service = %definition.name,
            auth = ?definition.auth(),
            item_path = ?definition.item_path(),
            total_count_path = ?definition.total_count_path,
            post_processor = ?definition.post_processor_name(),
            "Loaded service"
        );

        enabled.push(definition);
    }

    Ok(enabled)
}
