//! Post-processors
//!
//! Optional per-service transforms applied after normalization. A service
//! names its processor in configuration; the name is looked up once, when
//! the service is loaded, in a process-wide read-only registry.

pub mod weather;

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::schemas::AggregatedResult;

pub use weather::WeatherPostProcessor;

/// Rewrites a normalized result using the raw item and the search keyword
pub trait PostProcessor: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    fn process(&self, result: AggregatedResult, item: &Value, keyword: &str) -> AggregatedResult;
}

/// Registered processors keyed by lowercase name
static REGISTRY: Lazy<HashMap<String, Arc<dyn PostProcessor>>> = Lazy::new(|| {
    let weather: Arc<dyn PostProcessor> = Arc::new(WeatherPostProcessor);

    let mut registry = HashMap::new();
    registry.insert(weather.name().to_ascii_lowercase(), weather.clone());
    registry.insert("weather".to_string(), weather);
    registry
});

/// Looks up a processor by name, ignoring case. Blank names resolve to `None`.
pub fn lookup(name: &str) -> Option<Arc<dyn PostProcessor>> {
    let key = name.trim();
    if key.is_empty() {
        return None;
    }
    REGISTRY.get(&key.to_ascii_lowercase()).cloned()
}

/// Names of all registered processors, sorted
pub fn registered_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.values().map(|p| p.name()).collect();
    names.sort_unstable();
    names.dedup();
    names
}
