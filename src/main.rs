//! API Aggregator CLI
//! Keyword search across configurable HTTP/JSON APIs
//!
//! Features:
//! - Concurrent search of every enabled service
//! - Per-service query templates, auth and extraction paths
//! - Normalized results as JSON, a table or a summary
//! - Structured logging with optional JSON output
//! - Prometheus metrics dump after a search

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api_aggregator::aggregator::{Aggregator, ServiceResponse};
use api_aggregator::config::Config;
use api_aggregator::metrics::gather_metrics;
use api_aggregator::processors;
use api_aggregator::sources::{SearchQuery, DEFAULT_COUNT, DEFAULT_PAGE, DEFAULT_SORT_BY};

/// API Aggregator - keyword search across configured JSON APIs
#[derive(Parser, Debug)]
#[command(name = "api-aggregator")]
#[command(author = "AgileActors Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keyword search aggregation over configurable HTTP/JSON APIs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./aggregator.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Service catalog file, overrides the configured one
    #[arg(long, global = true)]
    services: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search configured services for a keyword
    Search {
        /// Search keyword
        keyword: String,

        /// Results per page
        #[arg(short = 'n', long, default_value_t = DEFAULT_COUNT)]
        count: u32,

        /// Page number (1-based)
        #[arg(short, long, default_value_t = DEFAULT_PAGE)]
        page: u32,

        /// Sort field passed to services that support it
        #[arg(long, default_value = DEFAULT_SORT_BY)]
        sort_by: String,

        /// Earliest date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from_date: Option<NaiveDate>,

        /// Only search this service (or "all")
        #[arg(short, long)]
        service: Option<String>,

        /// Output format (json, table, summary)
        #[arg(short, long, default_value = "summary")]
        output: String,

        /// Print Prometheus metrics after the search
        #[arg(long, default_value = "false")]
        metrics: bool,
    },

    /// List loaded services
    Services,
}

/// Generates a new correlation ID for the session
fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    let correlation_id = generate_correlation_id();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        correlation_id = %correlation_id,
        "Starting API Aggregator"
    );

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(services) = cli.services {
        config.services_file = services;
    }
    config.validate()?;

    info!(
        services_file = %config.services_file.display(),
        max_concurrent = config.max_concurrent_requests,
        request_timeout_secs = config.request_timeout_secs,
        "Configuration loaded"
    );

    let aggregator = Aggregator::from_config(&config).with_context(|| {
        format!("failed to load services from {}", config.services_file.display())
    })?;

    match cli.command {
        Commands::Search {
            keyword,
            count,
            page,
            sort_by,
            from_date,
            service,
            output,
            metrics,
        } => {
            let mut query = SearchQuery::new(keyword).count(count).page(page).sort_by(sort_by);
            if let Some(from_date) = from_date {
                query = query.from_date(from_date);
            }

            let responses = tokio::select! {
                responses = aggregator.search(service.as_deref(), &query) => responses?,
                _ = signal::ctrl_c() => {
                    warn!("Received Ctrl+C, search cancelled");
                    return Ok(());
                }
            };

            print_responses(&responses, &output)?;

            if metrics && config.metrics_enabled {
                println!("\n{}", gather_metrics());
            }
        }

        Commands::Services => {
            show_services(&aggregator);
        }
    }

    Ok(())
}

fn print_responses(responses: &[ServiceResponse], output_format: &str) -> Result<()> {
    match output_format {
        "json" => {
            let mut json = serde_json::Map::new();
            for r in responses {
                json.insert(r.service.clone(), serde_json::to_value(&r.response)?);
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        "table" => {
            println!("\n{:<16} {:<48} {:<25} {}", "Source", "Title", "Date", "URL");
            println!("{}", "-".repeat(120));
            for result in responses.iter().flat_map(|r| &r.response.results) {
                println!(
                    "{:<16} {:<48} {:<25} {}",
                    truncate(&result.source, 16),
                    truncate(&result.title, 48),
                    result.date.format("%Y-%m-%d %H:%M:%S UTC"),
                    result.url
                );
            }
            let total: usize = responses.iter().map(|r| r.response.len()).sum();
            println!("\nTotal: {} results", total);
        }
        _ => {
            println!("\nSearch Summary");
            println!("==============");
            for r in responses {
                println!(
                    "{:<20} results: {:<4} total: {}",
                    r.service,
                    r.response.len(),
                    r.response.total_count
                );
                if let Some(first) = r.response.results.first() {
                    println!("  first: {}", truncate(&first.title, 80));
                }
            }
        }
    }

    Ok(())
}

fn show_services(aggregator: &Aggregator) {
    println!("\nConfigured Services");
    println!("===================");
    if aggregator.is_empty() {
        println!("(none)");
    }
    for meta in aggregator.services() {
        println!(
            "{:<20} auth: {:<18} processor: {:<22} {}",
            meta.name,
            format!("{:?}", meta.auth_type),
            meta.post_processor.as_deref().unwrap_or("-"),
            meta.base_url
        );
    }
    println!("\nRegistered post-processors: {}", processors::registered_names().join(", "));
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
