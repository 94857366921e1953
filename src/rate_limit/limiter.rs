//! # Sliding-Window Rate Limiter
//!
//! Answers "may this client call this route right now" through the
//! [`BackendSupervisor`], so decisions come from Redis while it is healthy
//! and from the in-memory tier while it is not. `check` never returns an
//! error.
//!
//! ```rust
//! use ratewarden::cache::{BackendSupervisor, InMemoryCacheService};
//! use ratewarden::rate_limit::{PolicyRegistry, RateLimitPolicy, RateLimiter};
//!
//! # tokio_test::block_on(async {
//! let policies = PolicyRegistry::new(RateLimitPolicy::new(2, 60).unwrap());
//! let limiter = RateLimiter::new(
//!     BackendSupervisor::memory_only(InMemoryCacheService::new(100)),
//!     policies,
//! );
//!
//! assert!(limiter.check("203.0.113.7", "/api/v1/users").await.allowed);
//! assert!(limiter.check("203.0.113.7", "/api/v1/users").await.allowed);
//!
//! let rejected = limiter.check("203.0.113.7", "/api/v1/users").await;
//! assert!(!rejected.allowed);
//! assert_eq!(rejected.rejection().map(|r| r.status), Some(429));
//! # });
//! ```

use super::policy::{PolicyRegistry, RateLimitPolicy};
use crate::cache::errors::CacheResult;
use crate::cache::key::rate_limit_key;
use crate::cache::supervisor::BackendSupervisor;
use crate::cache::traits::WindowSnapshot;
use crate::config::{ConfigResult, RateLimitConfig};
use crate::logging::{log_error, log_rate_limit_decision};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Policy limit the decision was made against
    pub limit: u32,
    /// `max(0, limit - count)` after this attempt
    pub remaining: u32,
    /// Whole seconds until the oldest live request leaves the window
    pub reset_after_seconds: u64,
}

impl RateLimitDecision {
    /// Decision for a request that was never counted
    fn unmetered(policy: RateLimitPolicy) -> Self {
        Self {
            allowed: true,
            limit: policy.limit(),
            remaining: policy.limit(),
            reset_after_seconds: policy.window_seconds(),
        }
    }

    fn from_snapshot(policy: RateLimitPolicy, snapshot: WindowSnapshot) -> Self {
        let limit = policy.limit();
        let remaining = u64::from(limit).saturating_sub(snapshot.count) as u32;
        let reset_after_seconds = match ceil_seconds(snapshot.reset_after) {
            0 => policy.window_seconds(),
            seconds => seconds,
        };

        Self {
            allowed: snapshot.admitted,
            limit,
            remaining,
            reset_after_seconds,
        }
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Per-client, per-route sliding-window limiter
///
/// Cheap to clone; clones share the supervisor and policies.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    supervisor: BackendSupervisor,
    policies: Arc<PolicyRegistry>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(supervisor: BackendSupervisor, policies: PolicyRegistry) -> Self {
        Self {
            supervisor,
            policies: Arc::new(policies),
            enabled: true,
        }
    }

    /// Build from validated configuration, honoring `rate_limit.enabled`
    pub fn from_config(
        supervisor: BackendSupervisor,
        config: &RateLimitConfig,
    ) -> ConfigResult<Self> {
        let limiter =
            Self::new(supervisor, config.policy_registry()?).with_enabled(config.enabled);
        debug!(
            enabled = limiter.enabled,
            default_limit = limiter.policies.default_policy().limit(),
            default_window_seconds = limiter.policies.default_policy().window_seconds(),
            "Rate limiter configured"
        );
        Ok(limiter)
    }

    /// When disabled every check is allowed without touching a backend
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    pub fn policy_for(&self, route: &str) -> RateLimitPolicy {
        self.policies.policy_for(route)
    }

    /// Count one request from `client` against `route`'s policy
    pub async fn check(&self, client: &str, route: &str) -> RateLimitDecision {
        self.check_weighted(client, route, 1).await
    }

    /// Count a request that consumes `cost` slots
    ///
    /// Admission is all-or-nothing; a cost of 0 reports the window without
    /// recording anything.
    pub async fn check_weighted(&self, client: &str, route: &str, cost: u32) -> RateLimitDecision {
        let policy = self.policy_for(route);
        self.check_with_policy(client, route, policy, cost).await
    }

    /// Check against an explicit policy instead of the route's configured one
    pub async fn check_with_policy(
        &self,
        client: &str,
        route: &str,
        policy: RateLimitPolicy,
        cost: u32,
    ) -> RateLimitDecision {
        if !self.enabled {
            return RateLimitDecision::unmetered(policy);
        }

        let key = rate_limit_key(client, route);
        let decision = match self
            .supervisor
            .increment_with_expiry(key.as_str(), cost, policy.limit(), policy.window())
            .await
        {
            Ok(snapshot) => RateLimitDecision::from_snapshot(policy, snapshot),
            Err(e) => {
                // the supervisor already absorbs unavailability; anything
                // left is a backend protocol error and the request proceeds
                log_error(
                    "rate_limiter",
                    "check",
                    &e.to_string(),
                    Some(key.as_str()),
                );
                RateLimitDecision::unmetered(policy)
            }
        };

        log_rate_limit_decision(
            client,
            route,
            decision.allowed,
            decision.remaining,
            decision.reset_after_seconds,
            self.supervisor.active_backend(),
        );
        decision
    }

    /// Forget every request recorded for `(client, route)`
    pub async fn reset(&self, client: &str, route: &str) -> CacheResult<()> {
        let key = rate_limit_key(client, route);
        self.supervisor.delete(key.as_str()).await?;
        debug!(client = client, route = route, "Rate limit window reset");
        Ok(())
    }
}
