//! # Ratewarden Configuration System
//!
//! Layered configuration: built-in defaults, then optional TOML files, then
//! `RATEWARDEN__`-prefixed environment variables. See [`ConfigManager`] for
//! the loading order.
//!
//! Policy numbers are deserialized as signed integers so that a negative
//! `limit`, `window_seconds` or `ttl_seconds` is reported as
//! [`ConfigurationError::InvalidPolicy`] by [`RateWardenConfig::validate`]
//! instead of an opaque parse failure.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ratewarden::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let limit = manager.config().rate_limit.default.limit;
//! let redis_enabled = manager.config().distributed_enabled();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{defaults, keys};
use crate::rate_limit::{PolicyRegistry, RateLimitPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateWardenConfig {
    pub cache: CacheConfig,
    pub redis: RedisConfig,
    pub supervisor: SupervisorConfig,
    pub rate_limit: RateLimitConfig,
}

/// In-memory tier and memoization defaults
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied when a memoized operation does not choose its own
    pub default_ttl_seconds: i64,
    /// Capacity of the in-memory tier before eviction
    pub max_entries: usize,
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: defaults::CACHE_TTL_SECONDS as i64,
            max_entries: defaults::CACHE_MAX_ENTRIES,
            sweep_interval_ms: defaults::SWEEP_INTERVAL_MS,
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Distributed backend connection
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RedisConfig {
    /// When false, or when `url` is blank, the service runs in-memory only
    pub enabled: bool,
    pub url: String,
    pub operation_timeout_ms: u64,
    pub connection_timeout_ms: u64,
    /// Outer namespace for every key this service writes
    pub key_namespace: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: defaults::REDIS_URL.to_string(),
            operation_timeout_ms: defaults::REDIS_OPERATION_TIMEOUT_MS,
            connection_timeout_ms: defaults::REDIS_CONNECTION_TIMEOUT_MS,
            key_namespace: keys::DEFAULT_REDIS_NAMESPACE.to_string(),
        }
    }
}

impl RedisConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

/// Failover and recovery behavior
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    pub recovery_probe_interval_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            recovery_probe_interval_ms: defaults::RECOVERY_PROBE_INTERVAL_MS,
        }
    }
}

impl SupervisorConfig {
    pub fn recovery_probe_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_probe_interval_ms)
    }
}

/// Raw `{limit, window_seconds}` pair as written in configuration
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PolicySettings {
    pub limit: i64,
    pub window_seconds: i64,
}

impl PolicySettings {
    /// Validate into a [`RateLimitPolicy`], naming `field` in any error
    pub fn to_policy(&self, field: &str) -> ConfigResult<RateLimitPolicy> {
        RateLimitPolicy::new(self.limit, self.window_seconds).map_err(|e| match e {
            ConfigurationError::InvalidPolicy {
                field: inner,
                value,
                reason,
            } => ConfigurationError::invalid_policy(format!("{field}.{inner}"), value, reason),
            other => other,
        })
    }
}

/// Rate limiting policies per route class
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Master switch; when false every check is allowed without touching a backend
    pub enabled: bool,
    /// Policy for routes with no class mapping
    pub default: PolicySettings,
    /// Named policy classes
    pub classes: HashMap<String, PolicySettings>,
    /// Route -> class name
    pub routes: HashMap<String, String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut classes = HashMap::new();
        classes.insert(
            defaults::AUTH_ROUTE_CLASS.to_string(),
            PolicySettings {
                limit: i64::from(defaults::AUTH_RATE_LIMIT_PER_WINDOW),
                window_seconds: defaults::RATE_LIMIT_WINDOW_SECONDS as i64,
            },
        );

        Self {
            enabled: true,
            default: PolicySettings {
                limit: i64::from(defaults::RATE_LIMIT_PER_WINDOW),
                window_seconds: defaults::RATE_LIMIT_WINDOW_SECONDS as i64,
            },
            classes,
            routes: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Validate every policy and route mapping into a registry
    pub fn policy_registry(&self) -> ConfigResult<PolicyRegistry> {
        let mut registry = PolicyRegistry::new(self.default.to_policy("rate_limit.default")?);

        // sorted so the first reported error is deterministic
        let mut class_names: Vec<&String> = self.classes.keys().collect();
        class_names.sort();
        for name in class_names {
            let policy = self.classes[name].to_policy(&format!("rate_limit.classes.{name}"))?;
            registry = registry.with_class(name, policy);
        }

        let mut routes: Vec<(&String, &String)> = self.routes.iter().collect();
        routes.sort();
        for (route, class) in routes {
            registry = registry.with_route(route, class)?;
        }

        Ok(registry)
    }
}

impl RateWardenConfig {
    /// Whether the distributed backend should be attempted at all
    pub fn distributed_enabled(&self) -> bool {
        self.redis.enabled && !self.redis.url.trim().is_empty()
    }

    /// Startup validation; any error here is fatal
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.default_ttl_seconds <= 0 {
            return Err(ConfigurationError::invalid_policy(
                "cache.default_ttl_seconds",
                self.cache.default_ttl_seconds,
                "ttl_seconds must be greater than 0",
            ));
        }
        if self.cache.default_ttl_seconds > defaults::MAX_POLICY_SECONDS {
            return Err(ConfigurationError::invalid_policy(
                "cache.default_ttl_seconds",
                self.cache.default_ttl_seconds,
                format!("ttl_seconds must be at most {}", defaults::MAX_POLICY_SECONDS),
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.max_entries",
                "0",
                "in-memory capacity must be greater than 0",
            ));
        }

        if self.cache.sweep_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.sweep_interval_ms",
                "0",
                "sweep interval must be greater than 0",
            ));
        }

        if self.redis.enabled {
            if self.redis.url.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "redis.url",
                    "redis configuration (enabled = true)",
                ));
            }
            if self.redis.operation_timeout_ms == 0 {
                return Err(ConfigurationError::invalid_value(
                    "redis.operation_timeout_ms",
                    "0",
                    "every distributed call needs a bounded timeout",
                ));
            }
            if self.redis.connection_timeout_ms == 0 {
                return Err(ConfigurationError::invalid_value(
                    "redis.connection_timeout_ms",
                    "0",
                    "connection timeout must be greater than 0",
                ));
            }
        }

        if self.supervisor.recovery_probe_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "supervisor.recovery_probe_interval_ms",
                "0",
                "probe interval must be greater than 0",
            ));
        }

        self.rate_limit.policy_registry()?;
        Ok(())
    }
}
