//! Configuration for the cache system

use crate::error::{Result, SpreeError};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`CacheConfig::max_entries`]
pub const ENV_MAX_ENTRIES: &str = "SPREE_CACHE_MAX_ENTRIES";

/// Environment variable overriding [`CacheConfig::enable_metrics`]
pub const ENV_ENABLE_METRICS: &str = "SPREE_CACHE_ENABLE_METRICS";

/// Configuration for a query cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of keys held before the least recently used one is
    /// evicted
    pub max_entries: usize,

    /// Collect hit/miss and settlement counters
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(SpreeError::ConfigError(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build a configuration from the environment, loading a `.env` file
    /// first if one exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = CacheConfig::builder();

        if let Ok(raw) = std::env::var(ENV_MAX_ENTRIES) {
            let max = raw.trim().parse::<usize>().map_err(|e| {
                SpreeError::ConfigError(format!("{} must be an integer: {}", ENV_MAX_ENTRIES, e))
            })?;
            builder = builder.max_entries(max);
        }

        if let Ok(raw) = std::env::var(ENV_ENABLE_METRICS) {
            let enable = parse_flag(&raw).ok_or_else(|| {
                SpreeError::ConfigError(format!("{} must be a boolean, got {:?}", ENV_ENABLE_METRICS, raw))
            })?;
            builder = builder.enable_metrics(enable);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Configuration for short-lived screens with few distinct arguments
    pub fn small() -> Self {
        Self {
            max_entries: 100,
            ..Default::default()
        }
    }

    /// Configuration for caches keyed by many distinct arguments
    pub fn large() -> Self {
        Self {
            max_entries: 100_000,
            ..Default::default()
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    max_entries: Option<usize>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 1_000);
        assert!(config.enable_metrics);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid = CacheConfig::builder().max_entries(0).build();
        assert!(matches!(invalid.validate(), Err(SpreeError::ConfigError(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .max_entries(5)
            .enable_metrics(false)
            .build();

        assert_eq!(config.max_entries, 5);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(CacheConfig::small().max_entries, 100);
        assert_eq!(CacheConfig::large().max_entries, 100_000);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_from_env() {
        // Only test touching these variables
        std::env::set_var(ENV_MAX_ENTRIES, "42");
        std::env::set_var(ENV_ENABLE_METRICS, "no");
        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.max_entries, 42);
        assert!(!config.enable_metrics);

        std::env::set_var(ENV_MAX_ENTRIES, "lots");
        assert!(CacheConfig::from_env().is_err());

        std::env::remove_var(ENV_MAX_ENTRIES);
        std::env::remove_var(ENV_ENABLE_METRICS);
    }
}
