use crate::cache::{BackendSupervisor, CachePolicy, MemoizingCache};
use crate::config::{ConfigManager, RateWardenConfig};
use crate::error::Result;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared cache and rate-limit dependencies
///
/// One per process. Holds the single [`BackendSupervisor`] that the rate
/// limiter and the memoizing cache are both built on, so they fail over and
/// recover together.
pub struct SystemContext {
    /// System instance ID
    pub system_id: Uuid,

    /// Configuration manager with environment-aware loading
    pub config_manager: Arc<ConfigManager>,

    pub supervisor: BackendSupervisor,

    pub rate_limiter: RateLimiter,

    pub cache: MemoizingCache,
}

impl std::fmt::Debug for SystemContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemContext")
            .field("system_id", &self.system_id)
            .field("environment", &self.config_manager.environment())
            .field("backend_state", &self.supervisor.state())
            .field("active_backend", &self.supervisor.active_backend())
            .field("rate_limit_enabled", &self.rate_limiter.is_enabled())
            .finish()
    }
}

impl SystemContext {
    /// Create SystemContext with environment-aware configuration loading
    pub async fn new() -> Result<Self> {
        info!("Initializing SystemContext with auto-detected environment configuration");
        let config_manager = ConfigManager::load()?;
        Self::from_config(config_manager).await
    }

    /// Create SystemContext from an already loaded configuration manager
    ///
    /// Fails only on invalid policy configuration. An unreachable Redis
    /// starts the context degraded rather than failing.
    pub async fn from_config(config_manager: Arc<ConfigManager>) -> Result<Self> {
        let config = config_manager.config();
        config.validate()?;

        let supervisor = BackendSupervisor::from_config(config).await;
        let rate_limiter = RateLimiter::from_config(supervisor.clone(), &config.rate_limit)?;
        let cache = MemoizingCache::new(supervisor.clone());
        let system_id = Uuid::new_v4();

        info!(
            system_id = %system_id,
            environment = config_manager.environment(),
            active_backend = supervisor.active_backend(),
            backend_state = %supervisor.state(),
            rate_limit_enabled = rate_limiter.is_enabled(),
            "SystemContext initialized"
        );

        Ok(Self {
            system_id,
            config_manager,
            supervisor,
            rate_limiter,
            cache,
        })
    }

    /// Create SystemContext from a configuration value, for tests and embedding
    pub async fn from_settings(config: RateWardenConfig, environment: &str) -> Result<Self> {
        let config_manager = ConfigManager::from_config(config, environment)?;
        Self::from_config(config_manager).await
    }

    pub fn config(&self) -> &RateWardenConfig {
        self.config_manager.config()
    }

    /// Cache policy for `key_prefix` using the configured default TTL
    pub fn cache_policy(&self, key_prefix: &str) -> Result<CachePolicy> {
        Ok(CachePolicy::with_default_ttl(key_prefix, &self.config().cache)?)
    }
}
