//! Configuration management

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CERTIFICATION_BASE_URL, DEFAULT_BACKOFF_BASE_MS, DEFAULT_RETRY_BUDGET,
    DEFAULT_TOKEN_TTL_SECS, MAX_RETRY_BUDGET, PRODUCTION_BASE_URL,
};
use crate::types::Environment;

/// Session layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiiConfig {
    pub environment: Environment,
    pub verify_ssl: bool,
    /// Attempts per remote call; clamped to `MAX_RETRY_BUDGET`.
    pub retry_budget: u32,
    pub backoff_base_ms: u64,
    pub token_ttl_secs: u64,
    /// Authenticate at most once per signer when several callers race on a
    /// cold cache.
    pub single_flight: bool,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub endpoints: EndpointConfig,
}

impl SiiConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Configured retry budget, with `0` meaning the default.
    pub fn effective_retry_budget(&self) -> u32 {
        resolve_retry_budget(self.retry_budget, DEFAULT_RETRY_BUDGET)
    }
}

impl Default for SiiConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            verify_ssl: true,
            retry_budget: DEFAULT_RETRY_BUDGET,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            single_flight: false,
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

/// Clamp a requested retry budget to `1..=MAX_RETRY_BUDGET`.
///
/// `0` selects `fallback` (itself clamped).
pub fn resolve_retry_budget(requested: u32, fallback: u32) -> u32 {
    let budget = if requested == 0 { fallback } else { requested };
    budget.clamp(1, MAX_RETRY_BUDGET)
}

/// Token cache backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Filesystem,
}

crate::impl_domain_status_conversions!(CacheBackend {
    Memory => "memory",
    Filesystem => "filesystem",
});

/// Token cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Directory for the filesystem backend. Defaults to a folder under the
    /// system temp dir.
    pub directory: Option<PathBuf>,
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, connect_timeout_secs: 10, user_agent: None }
    }
}

/// Endpoint resolution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub production_base: String,
    pub certification_base: String,
    /// Extra certification overrides, service name → absolute URL. Merged
    /// over the bundled table.
    pub certification_overrides: BTreeMap<String, String>,
}

impl EndpointConfig {
    pub fn base_for(&self, environment: Environment) -> &str {
        match environment {
            Environment::Production => &self.production_base,
            Environment::Certification => &self.certification_base,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            production_base: PRODUCTION_BASE_URL.to_string(),
            certification_base: CERTIFICATION_BASE_URL.to_string(),
            certification_overrides: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = SiiConfig::default();
        assert_eq!(config.environment, Environment::Production);
        assert!(config.verify_ssl);
        assert_eq!(config.retry_budget, 10);
        assert_eq!(config.token_ttl(), Duration::from_secs(30));
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.endpoints.base_for(Environment::Certification), CERTIFICATION_BASE_URL);
    }

    #[test]
    fn retry_budget_is_clamped() {
        let mut config = SiiConfig { retry_budget: 500, ..SiiConfig::default() };
        assert_eq!(config.effective_retry_budget(), MAX_RETRY_BUDGET);
        config.retry_budget = 0;
        assert_eq!(config.effective_retry_budget(), DEFAULT_RETRY_BUDGET);
        config.retry_budget = 4;
        assert_eq!(config.effective_retry_budget(), 4);
    }

    #[test]
    fn zero_budget_selects_fallback() {
        assert_eq!(resolve_retry_budget(0, 7), 7);
        assert_eq!(resolve_retry_budget(0, 0), 1);
        assert_eq!(resolve_retry_budget(21, 7), MAX_RETRY_BUDGET);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SiiConfig =
            serde_json::from_str(r#"{"environment":"certification","cache":{"backend":"filesystem"}}"#)
                .unwrap();
        assert_eq!(config.environment, Environment::Certification);
        assert_eq!(config.cache.backend, CacheBackend::Filesystem);
        assert_eq!(config.retry_budget, DEFAULT_RETRY_BUDGET);
        assert_eq!(config.http.timeout_secs, 30);
    }
}
