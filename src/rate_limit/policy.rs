//! Rate-limit policies and the route-class registry

use crate::config::{ConfigResult, ConfigurationError};
use crate::constants::defaults::MAX_POLICY_SECONDS;
use std::collections::HashMap;
use std::time::Duration;

/// `{limit, window}` pair, validated positive on construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimitPolicy {
    limit: u32,
    window_seconds: u64,
}

impl RateLimitPolicy {
    /// Validate raw configuration numbers
    ///
    /// Zero or negative values, and windows longer than a year, are
    /// [`ConfigurationError::InvalidPolicy`].
    pub fn new(limit: i64, window_seconds: i64) -> ConfigResult<Self> {
        if limit <= 0 {
            return Err(ConfigurationError::invalid_policy(
                "limit",
                limit,
                "limit must be greater than 0",
            ));
        }
        if window_seconds <= 0 {
            return Err(ConfigurationError::invalid_policy(
                "window_seconds",
                window_seconds,
                "window_seconds must be greater than 0",
            ));
        }
        if window_seconds > MAX_POLICY_SECONDS {
            return Err(ConfigurationError::invalid_policy(
                "window_seconds",
                window_seconds,
                format!("window_seconds must be at most {MAX_POLICY_SECONDS}"),
            ));
        }
        let limit = u32::try_from(limit).map_err(|_| {
            ConfigurationError::invalid_policy("limit", limit, "limit must fit in 32 bits")
        })?;

        Ok(Self {
            limit,
            window_seconds: window_seconds as u64,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Policy lookup by route
///
/// A route resolves to its mapped class when one is configured, otherwise to
/// the default policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRegistry {
    default: RateLimitPolicy,
    classes: HashMap<String, RateLimitPolicy>,
    routes: HashMap<String, String>,
}

impl PolicyRegistry {
    pub fn new(default: RateLimitPolicy) -> Self {
        Self {
            default,
            classes: HashMap::new(),
            routes: HashMap::new(),
        }
    }

    /// Register or replace a named policy class
    pub fn with_class(mut self, name: impl Into<String>, policy: RateLimitPolicy) -> Self {
        self.classes.insert(name.into(), policy);
        self
    }

    /// Map a route onto an already registered class
    pub fn with_route(
        mut self,
        route: impl Into<String>,
        class: impl Into<String>,
    ) -> ConfigResult<Self> {
        let route = route.into();
        let class = class.into();
        if !self.classes.contains_key(&class) {
            return Err(ConfigurationError::UnknownRouteClass { route, class });
        }
        self.routes.insert(route, class);
        Ok(self)
    }

    pub fn default_policy(&self) -> RateLimitPolicy {
        self.default
    }

    pub fn class(&self, name: &str) -> Option<RateLimitPolicy> {
        self.classes.get(name).copied()
    }

    /// Class name a route is mapped to, if any
    pub fn class_for(&self, route: &str) -> Option<&str> {
        self.routes.get(route).map(String::as_str)
    }

    pub fn policy_for(&self, route: &str) -> RateLimitPolicy {
        self.class_for(route)
            .and_then(|class| self.class(class))
            .unwrap_or(self.default)
    }

    /// Class names in sorted order
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `(route, class)` mappings in sorted order
    pub fn routes(&self) -> Vec<(&str, &str)> {
        let mut routes: Vec<(&str, &str)> = self
            .routes
            .iter()
            .map(|(r, c)| (r.as_str(), c.as_str()))
            .collect();
        routes.sort_unstable();
        routes
    }
}
