//! Result normalization
//!
//! Turns one service-specific JSON item into an [`AggregatedResult`]
//! using the service's extraction paths. Every field has a fallback,
//! so normalization never fails.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::json_path::{resolve_non_empty_str, resolve_opt, resolve_str};
use crate::schemas::{AggregatedResult, ServiceDefinition};

/// Image template used when a service does not configure its own
pub const DEFAULT_IMAGE_URL_TEMPLATE: &str = "https://openweathermap.org/img/wn/{value}@2x.png";

/// Offset formats RFC 3339 rejects, such as `+0000`
const OFFSET_DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Builds normalized results for a single service
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    definition: &'a ServiceDefinition,
}

impl<'a> Normalizer<'a> {
    pub fn new(definition: &'a ServiceDefinition) -> Self {
        Self { definition }
    }

    /// Normalizes `item`. The title falls back to `keyword`.
    pub fn normalize(&self, item: &Value, keyword: &str) -> AggregatedResult {
        let def = self.definition;

        AggregatedResult {
            source: def.name.clone(),
            title: resolve_str(item, def.title_path.as_deref())
                .unwrap_or(keyword)
                .to_string(),
            description: resolve_str(item, def.description_path.as_deref())
                .unwrap_or_default()
                .to_string(),
            url: resolve_str(item, def.url_path.as_deref())
                .unwrap_or_default()
                .to_string(),
            image_url: resolve_non_empty_str(item, def.image_path.as_deref())
                .map(|value| self.image_url(value)),
            date: parse_date(resolve_opt(item, def.date_path.as_deref())).unwrap_or_else(Utc::now),
        }
    }

    /// Absolute URLs pass through; anything else is treated as an icon identifier.
    fn image_url(&self, value: &str) -> String {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            return value.to_string();
        }

        self.definition
            .image_url_template
            .as_deref()
            .unwrap_or(DEFAULT_IMAGE_URL_TEMPLATE)
            .replace("{value}", value)
    }
}

/// Interprets a JSON value as a timestamp.
///
/// Strings are parsed as date/time text, numbers as Unix seconds.
pub fn parse_date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(text) => parse_date_str(text),
        Value::Number(n) => {
            let secs = n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?;
            DateTime::from_timestamp(secs, 0)
        }
        _ => None,
    }
}

fn parse_date_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_DATE_TIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // Timezone-less values are taken as UTC
    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    // Day, month (`2024-01`) or year (`2024`) precision; missing parts default to the first
    let padded = match text.len() {
        4 if text.bytes().all(|b| b.is_ascii_digit()) => format!("{text}-01-01"),
        7 => format!("{text}-01"),
        _ => text.to_string(),
    };
    NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
