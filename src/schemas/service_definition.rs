//! ServiceDefinition Schema
//!
//! Immutable per-service configuration: where to call, how to
//! authenticate, and where each result field lives in the response.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Authentication mode applied to outgoing requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    ApiKey,
    ClientCredentials,
}

impl AuthType {
    /// Parses a configured auth type. Blank means `None`; unrecognized values return `Option::None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "" | "none" => Some(AuthType::None),
            "apikey" => Some(AuthType::ApiKey),
            "clientcredentials" => Some(AuthType::ClientCredentials),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServiceDefinition {
    #[validate(length(min = 1, message = "service name must not be empty"))]
    pub name: String,
    #[validate(url(message = "base_url must be an absolute URL"))]
    pub base_url: String,
    /// Appended to `base_url`; supports `{keyword}`, `{count}`, `{page}`,
    /// `{offset}`, `{sortBy}`, `{fromDate}`, `{apiKey}`, `{clientId}`, `{clientSecret}`
    pub query_template: String,

    // Authentication
    pub auth_type: Option<String>,
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: Option<String>,
    /// Reuse client-credentials tokens until they expire
    pub cache_token: bool,

    pub enabled: bool,

    // Extraction paths
    pub item_path: Option<String>,
    pub title_path: Option<String>,
    pub description_path: Option<String>,
    pub url_path: Option<String>,
    pub image_path: Option<String>,
    pub date_path: Option<String>,
    pub total_count_path: Option<String>,

    /// Template for non-URL image values, `{value}` is replaced by the resolved string
    pub image_url_template: Option<String>,

    /// Registered post-processor name (case-insensitive)
    pub post_processor: Option<String>,
}

impl Default for ServiceDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            query_template: String::new(),
            auth_type: None,
            api_key: None,
            client_id: None,
            client_secret: None,
            token_url: None,
            cache_token: false,
            enabled: true,
            item_path: None,
            title_path: None,
            description_path: None,
            url_path: None,
            image_path: None,
            date_path: None,
            total_count_path: None,
            image_url_template: None,
            post_processor: None,
        }
    }
}

impl ServiceDefinition {
    /// Creates an unauthenticated definition with no extraction paths
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        query_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            query_template: query_template.into(),
            ..Default::default()
        }
    }

    /// Effective authentication mode; unrecognized values fall back to `None`
    pub fn auth(&self) -> AuthType {
        self.auth_type
            .as_deref()
            .and_then(AuthType::parse)
            .unwrap_or_default()
    }

    /// True if `auth_type` is set to something we don't understand
    pub fn has_unknown_auth_type(&self) -> bool {
        self.auth_type
            .as_deref()
            .is_some_and(|raw| AuthType::parse(raw).is_none())
    }

    /// Item collection path, treating blank values as unset
    pub fn item_path(&self) -> Option<&str> {
        self.item_path.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    pub fn post_processor_name(&self) -> Option<&str> {
        self.post_processor.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_type_parsing() {
        assert_eq!(AuthType::parse(""), Some(AuthType::None));
        assert_eq!(AuthType::parse("None"), Some(AuthType::None));
        assert_eq!(AuthType::parse("ApiKey"), Some(AuthType::ApiKey));
        assert_eq!(AuthType::parse("api_key"), Some(AuthType::ApiKey));
        assert_eq!(AuthType::parse("ClientCredentials"), Some(AuthType::ClientCredentials));
        assert_eq!(AuthType::parse("client-credentials"), Some(AuthType::ClientCredentials));
        assert_eq!(AuthType::parse("oauth"), None);
    }

    #[test]
    fn test_unknown_auth_falls_back_to_none() {
        let def = ServiceDefinition {
            auth_type: Some("kerberos".to_string()),
            ..ServiceDefinition::new("svc", "https://api.test.com", "/")
        };
        assert_eq!(def.auth(), AuthType::None);
        assert!(def.has_unknown_auth_type());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let raw = r#"
            name = "OpenWeather"
            base_url = "https://api.openweathermap.org"
            query_template = "/data/2.5/weather?q={keyword}&appid={apiKey}&units=metric"
            auth_type = "ApiKey"
            api_key = "secret"
            title_path = "name"
            date_path = "dt"
            post_processor = "WeatherPostProcessor"
        "#;

        let def: ServiceDefinition = toml_like(raw);
        assert_eq!(def.name, "OpenWeather");
        assert_eq!(def.auth(), AuthType::ApiKey);
        assert!(def.enabled);
        assert_eq!(def.item_path(), None);
        assert_eq!(def.post_processor_name(), Some("WeatherPostProcessor"));
    }

    #[test]
    fn test_validation() {
        let valid = ServiceDefinition::new("svc", "https://api.test.com", "/q");
        assert!(valid.validate().is_ok());

        let nameless = ServiceDefinition::new("", "https://api.test.com", "/q");
        assert!(nameless.validate().is_err());

        let bad_url = ServiceDefinition::new("svc", "not a url", "/q");
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_blank_paths_are_unset() {
        let def = ServiceDefinition {
            item_path: Some("  ".to_string()),
            post_processor: Some("".to_string()),
            ..ServiceDefinition::new("svc", "https://api.test.com", "/")
        };
        assert_eq!(def.item_path(), None);
        assert_eq!(def.post_processor_name(), None);
    }

    fn toml_like(raw: &str) -> ServiceDefinition {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
