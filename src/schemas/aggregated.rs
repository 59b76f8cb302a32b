//! Aggregated result schemas
//!
//! Uniform output shape shared by every configured service.
//! Serialized with camelCase keys for the HTTP/JSON consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized hit from a service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub source: String,
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub date: DateTime<Utc>,
}

impl AggregatedResult {
    /// Diagnostic result used when a fetch degrades
    pub fn degraded(
        source: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            description: description.into(),
            url: url.into(),
            image_url: None,
            date: Utc::now(),
        }
    }
}

/// Results of a single fetch plus the upstream total
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResponse {
    pub results: Vec<AggregatedResult>,
    /// May exceed `results.len()` when the upstream API paginates
    pub total_count: i64,
}

impl AggregatedResponse {
    pub fn new(results: Vec<AggregatedResult>, total_count: i64) -> Self {
        Self {
            results,
            total_count,
        }
    }

    /// Single diagnostic result with a zero total
    pub fn failure(result: AggregatedResult) -> Self {
        Self::new(vec![result], 0)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_is_camel_case() {
        let result = AggregatedResult {
            source: "news".to_string(),
            title: "Title".to_string(),
            description: "Desc".to_string(),
            url: "https://example.com/a".to_string(),
            image_url: Some("https://example.com/a.png".to_string()),
            date: "2024-01-15T10:00:00Z".parse().unwrap(),
        };
        let response = AggregatedResponse::new(vec![result], 42);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["totalCount"], 42);
        assert_eq!(json["results"][0]["imageUrl"], "https://example.com/a.png");
        assert_eq!(json["results"][0]["date"], "2024-01-15T10:00:00Z");
    }

    #[test]
    fn test_missing_image_is_omitted() {
        let result = AggregatedResult::degraded("svc", "Error fetching svc", "boom", "");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("imageUrl").is_none());
    }

    #[test]
    fn test_failure_has_zero_total() {
        let response = AggregatedResponse::failure(AggregatedResult::degraded("svc", "t", "d", "u"));
        assert_eq!(response.len(), 1);
        assert_eq!(response.total_count, 0);
    }
}
