//! Configuration for the conditional response cache

use http::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the conditional response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Prefix of every key written to the store, usually the service name
    pub namespace: String,

    /// Data domain (database schema) whose modification time decides freshness
    pub data_domain: String,

    /// HTTP method of the cacheable route
    pub cacheable_method: String,

    /// Path of the cacheable route
    pub cacheable_path: String,

    /// Answer `If-None-Match` hits with 304 when the data has not changed
    pub enable_if_none_match_fast_path: bool,

    /// Largest response body that will be captured for caching
    ///
    /// A successful response above this size is answered with 500
    /// `RESPONSE_CAPTURE_FAILED` after the handler has run, and nothing is
    /// stored. Size it for the largest unfiltered listing the deployment
    /// serves (`CACHE_MAX_BODY_BYTES` when the server config is read from
    /// the environment).
    pub max_body_bytes: usize,

    /// Content type of responses served from the cache
    pub content_type: String,

    /// Expiry attached to written entries. `None` leaves eviction to the store.
    pub entry_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "water-usage-consumers".to_string(),
            data_domain: "water_usage".to_string(),
            cacheable_method: "GET".to_string(),
            cacheable_path: "/".to_string(),
            enable_if_none_match_fast_path: true,
            // 16 MB
            max_body_bytes: 16 * 1024 * 1024,
            content_type: "application/json".to_string(),
            entry_ttl: None,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.trim().is_empty() {
            return Err("namespace must not be empty".to_string());
        }

        if self.data_domain.trim().is_empty() {
            return Err("data_domain must not be empty".to_string());
        }

        if Method::from_bytes(self.cacheable_method.as_bytes()).is_err() {
            return Err(format!(
                "cacheable_method '{}' is not a valid HTTP method",
                self.cacheable_method
            ));
        }

        if !self.cacheable_path.starts_with('/') {
            return Err("cacheable_path must start with '/'".to_string());
        }

        if self.max_body_bytes == 0 {
            return Err("max_body_bytes must be greater than 0".to_string());
        }

        if matches!(self.entry_ttl, Some(ttl) if ttl.as_secs() == 0) {
            return Err("entry_ttl must be at least one second".to_string());
        }

        Ok(())
    }

    /// Whether a request with this method and path goes through the cache
    pub fn is_cacheable(&self, method: &Method, path: &str) -> bool {
        method.as_str().eq_ignore_ascii_case(&self.cacheable_method) && path == self.cacheable_path
    }
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    namespace: Option<String>,
    data_domain: Option<String>,
    cacheable_method: Option<String>,
    cacheable_path: Option<String>,
    enable_if_none_match_fast_path: Option<bool>,
    max_body_bytes: Option<usize>,
    content_type: Option<String>,
    entry_ttl: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Set the key namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the data domain consulted for freshness
    pub fn data_domain(mut self, domain: impl Into<String>) -> Self {
        self.data_domain = Some(domain.into());
        self
    }

    /// Set the cacheable route
    pub fn cacheable_route(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.cacheable_method = Some(method.into());
        self.cacheable_path = Some(path.into());
        self
    }

    /// Enable or disable the `If-None-Match` 304 fast path
    pub fn enable_if_none_match_fast_path(mut self, enable: bool) -> Self {
        self.enable_if_none_match_fast_path = Some(enable);
        self
    }

    /// Set the largest capturable body size in bytes
    pub fn max_body_bytes(mut self, size: usize) -> Self {
        self.max_body_bytes = Some(size);
        self
    }

    /// Set the content type of cache hits
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set an expiry for written entries
    pub fn entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = Some(ttl);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            namespace: self.namespace.unwrap_or(defaults.namespace),
            data_domain: self.data_domain.unwrap_or(defaults.data_domain),
            cacheable_method: self.cacheable_method.unwrap_or(defaults.cacheable_method),
            cacheable_path: self.cacheable_path.unwrap_or(defaults.cacheable_path),
            enable_if_none_match_fast_path: self
                .enable_if_none_match_fast_path
                .unwrap_or(defaults.enable_if_none_match_fast_path),
            max_body_bytes: self.max_body_bytes.unwrap_or(defaults.max_body_bytes),
            content_type: self.content_type.unwrap_or(defaults.content_type),
            entry_ttl: self.entry_ttl.or(defaults.entry_ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.namespace, "water-usage-consumers");
        assert_eq!(config.data_domain, "water_usage");
        assert!(config.enable_if_none_match_fast_path);
        assert!(config.entry_ttl.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut invalid_config = CacheConfig::default();
        invalid_config.namespace = " ".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.cacheable_path = "consumers".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.cacheable_method = "GE T".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.max_body_bytes = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.entry_ttl = Some(Duration::from_millis(10));
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .namespace("svc")
            .data_domain("geodata")
            .cacheable_route("GET", "/consumers")
            .enable_if_none_match_fast_path(false)
            .entry_ttl(Duration::from_secs(600))
            .build();

        assert_eq!(config.namespace, "svc");
        assert_eq!(config.data_domain, "geodata");
        assert_eq!(config.cacheable_path, "/consumers");
        assert!(!config.enable_if_none_match_fast_path);
        assert_eq!(config.entry_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.content_type, "application/json");
    }

    #[test]
    fn test_cacheable_predicate() {
        let config = CacheConfig::default();
        assert!(config.is_cacheable(&Method::GET, "/"));
        assert!(!config.is_cacheable(&Method::PUT, "/"));
        assert!(!config.is_cacheable(&Method::GET, "/ping"));
    }
}
