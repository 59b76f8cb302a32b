//! Request authentication
//!
//! Each service authenticates in one of three ways:
//! - `None`: request sent as is
//! - `ApiKey`: static `X-Api-Key` header
//! - `ClientCredentials`: OAuth2 token exchange before every request,
//!   sent as a Bearer token. Tokens are only reused when the service
//!   opts into the [`TokenCache`].
//!
//! Authentication never aborts a fetch. A failed token exchange leaves the
//! request unauthenticated and the upstream API decides what to do with it.

use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{AggregatorError, Result};
use crate::http_client::Transport;
use crate::metrics;
use crate::schemas::{AuthType, ServiceDefinition};

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Tokens are dropped this long before the upstream expiry
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Option<String>,
}

/// Authentication strategy derived from a service definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    None,
    ApiKey(String),
    ClientCredentials(ClientCredentials),
}

impl AuthStrategy {
    pub fn from_definition(definition: &ServiceDefinition) -> Self {
        match definition.auth() {
            AuthType::None => AuthStrategy::None,
            AuthType::ApiKey => match non_blank(definition.api_key.as_deref()) {
                Some(key) => AuthStrategy::ApiKey(key.to_string()),
                None => {
                    warn!(service = %definition.name, "ApiKey auth configured without a key, sending requests unauthenticated");
                    AuthStrategy::None
                }
            },
            AuthType::ClientCredentials => AuthStrategy::ClientCredentials(ClientCredentials {
                client_id: definition.client_id.clone().unwrap_or_default(),
                client_secret: definition.client_secret.clone().unwrap_or_default(),
                token_url: non_blank(definition.token_url.as_deref()).map(str::to_string),
            }),
        }
    }

    pub fn auth_type(&self) -> AuthType {
        match self {
            AuthStrategy::None => AuthType::None,
            AuthStrategy::ApiKey(_) => AuthType::ApiKey,
            AuthStrategy::ClientCredentials(_) => AuthType::ClientCredentials,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Client-credentials tokens keyed by service name
#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token that is still valid, evicting it if it has expired
    pub fn get(&self, service: &str) -> Option<String> {
        let mut tokens = self.tokens.lock();
        match tokens.get(service) {
            Some(cached) if cached.expires_at > Instant::now() => Some(cached.token.clone()),
            Some(_) => {
                tokens.remove(service);
                None
            }
            None => None,
        }
    }

    /// Stores a token valid for `ttl` (minus a safety margin). Lifetimes shorter than the margin are not cached.
    pub fn insert(&self, service: &str, token: String, ttl: Duration) {
        let Some(lifetime) = ttl.checked_sub(EXPIRY_SKEW).filter(|d| !d.is_zero()) else {
            return;
        };
        self.tokens.lock().insert(
            service.to_string(),
            CachedToken {
                token,
                expires_at: Instant::now() + lifetime,
            },
        );
    }

    pub fn invalidate(&self, service: &str) {
        self.tokens.lock().remove(service);
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

/// Applies a service's authentication strategy to outgoing requests
pub struct Authenticator {
    service: String,
    strategy: AuthStrategy,
    cache: Option<Arc<TokenCache>>,
}

impl Authenticator {
    /// The cache is only used when the definition sets `cache_token`
    pub fn new(definition: &ServiceDefinition, cache: Option<Arc<TokenCache>>) -> Self {
        Self {
            service: definition.name.clone(),
            strategy: AuthStrategy::from_definition(definition),
            cache: cache.filter(|_| definition.cache_token),
        }
    }

    pub fn strategy(&self) -> &AuthStrategy {
        &self.strategy
    }

    /// Drops the cached token after the upstream API rejected it
    pub fn reject_token(&self) {
        if let (AuthStrategy::ClientCredentials(_), Some(cache)) = (&self.strategy, &self.cache) {
            debug!(service = %self.service, "Access token rejected, evicting it from the cache");
            cache.invalidate(&self.service);
        }
    }

    /// Adds credentials to `builder`
    pub async fn authorize(&self, transport: &dyn Transport, builder: RequestBuilder) -> RequestBuilder {
        match &self.strategy {
            AuthStrategy::None => builder,
            AuthStrategy::ApiKey(key) => builder.header(API_KEY_HEADER, key),
            AuthStrategy::ClientCredentials(credentials) => {
                match self.access_token(transport, credentials).await {
                    Some(token) => builder.bearer_auth(token),
                    None => builder,
                }
            }
        }
    }

    async fn access_token(&self, transport: &dyn Transport, credentials: &ClientCredentials) -> Option<String> {
        if let Some(token) = self.cache.as_ref().and_then(|c| c.get(&self.service)) {
            debug!(service = %self.service, "Using cached access token");
            return Some(token);
        }

        match request_token(transport, credentials).await {
            Ok(response) => {
                metrics::record_token_request(&self.service, "success");
                let token = response.access_token?;
                if let (Some(cache), Some(expires_in)) = (&self.cache, response.expires_in) {
                    cache.insert(&self.service, token.clone(), Duration::from_secs(expires_in));
                }
                Some(token)
            }
            Err(e) => {
                metrics::record_token_request(&self.service, e.kind());
                warn!(
                    service = %self.service,
                    error = %e,
                    "Token exchange failed, continuing without authentication"
                );
                None
            }
        }
    }
}

/// POSTs `grant_type=client_credentials` with HTTP Basic credentials
async fn request_token(transport: &dyn Transport, credentials: &ClientCredentials) -> Result<TokenResponse> {
    let token_url = credentials
        .token_url
        .as_deref()
        .ok_or_else(|| AggregatorError::ValidationError("token_url is not configured".to_string()))?;

    let request = transport
        .client()
        .post(token_url)
        .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body("grant_type=client_credentials")
        .build()?;

    let response = transport.execute(request).await?;
    let token: TokenResponse = serde_json::from_slice(&response.bytes().await?)?;

    if token.access_token.as_deref().map_or(true, str::is_empty) {
        return Err(AggregatorError::ParseError("token response has no access_token".to_string()));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(auth_type: &str) -> ServiceDefinition {
        ServiceDefinition {
            auth_type: Some(auth_type.to_string()),
            api_key: Some("key-123".to_string()),
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            token_url: Some("https://auth.test.com/token".to_string()),
            ..ServiceDefinition::new("svc", "https://api.test.com", "/")
        }
    }

    #[test]
    fn test_strategy_from_definition() {
        assert_eq!(AuthStrategy::from_definition(&definition("")), AuthStrategy::None);
        assert_eq!(
            AuthStrategy::from_definition(&definition("ApiKey")),
            AuthStrategy::ApiKey("key-123".to_string())
        );
        assert_eq!(
            AuthStrategy::from_definition(&definition("ClientCredentials")),
            AuthStrategy::ClientCredentials(ClientCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                token_url: Some("https://auth.test.com/token".to_string()),
            })
        );
    }

    #[test]
    fn test_blank_api_key_disables_auth() {
        let def = ServiceDefinition {
            api_key: Some("   ".to_string()),
            ..definition("ApiKey")
        };
        assert_eq!(AuthStrategy::from_definition(&def), AuthStrategy::None);
    }

    #[test]
    fn test_cache_only_when_opted_in() {
        let cache = Arc::new(TokenCache::new());

        let plain = Authenticator::new(&definition("ClientCredentials"), Some(cache.clone()));
        assert!(plain.cache.is_none());

        let caching = Authenticator::new(
            &ServiceDefinition {
                cache_token: true,
                ..definition("ClientCredentials")
            },
            Some(cache),
        );
        assert!(caching.cache.is_some());
        assert_eq!(caching.strategy().auth_type(), AuthType::ClientCredentials);
    }

    #[test]
    fn test_token_cache_expiry() {
        let cache = TokenCache::new();
        cache.insert("svc", "abc".to_string(), Duration::from_secs(3600));
        assert_eq!(cache.get("svc").as_deref(), Some("abc"));
        assert_eq!(cache.get("other"), None);

        // shorter than the skew: never cached
        cache.insert("short", "tmp".to_string(), Duration::from_secs(10));
        assert_eq!(cache.get("short"), None);

        cache.invalidate("svc");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_token_is_evicted() {
        let cache = TokenCache::new();
        cache.tokens.lock().insert(
            "svc".to_string(),
            CachedToken {
                token: "old".to_string(),
                expires_at: Instant::now(),
            },
        );
        assert_eq!(cache.get("svc"), None);
        assert_eq!(cache.len(), 0);
    }
}
