//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ratewarden::cache::{
    BackendSupervisor, CacheBackend, CacheError, CacheResult, InMemoryCacheService, WindowSnapshot,
};
use ratewarden::config::RateWardenConfig;
use ratewarden::rate_limit::{PolicyRegistry, RateLimitPolicy, RateLimiter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Address nothing listens on; connects fail immediately
pub const UNREACHABLE_REDIS_URL: &str = "redis://127.0.0.1:1/0";

/// Redis URL backed by a listener that accepts connections and never replies
///
/// Models a hung server or a black-holed network path: the TCP handshake
/// succeeds, every request then waits forever.
pub async fn silent_redis_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("redis://{addr}/0")
}

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();
}

pub fn memory_supervisor() -> BackendSupervisor {
    BackendSupervisor::memory_only(InMemoryCacheService::new(10_000))
}

pub fn memory_limiter(limit: i64, window_seconds: i64) -> RateLimiter {
    let policies = PolicyRegistry::new(RateLimitPolicy::new(limit, window_seconds).unwrap());
    RateLimiter::new(memory_supervisor(), policies)
}

pub fn unreachable_redis_config() -> RateWardenConfig {
    let mut config = RateWardenConfig::default();
    config.redis.enabled = true;
    config.redis.url = UNREACHABLE_REDIS_URL.to_string();
    config.redis.connection_timeout_ms = 200;
    config.redis.operation_timeout_ms = 200;
    config.supervisor.recovery_probe_interval_ms = 60_000;
    config
}

/// Stand-in for a shared store whose network can be cut by the test
#[derive(Debug, Clone)]
pub struct SwitchableBackend {
    reachable: Arc<AtomicBool>,
    calls: Arc<AtomicU64>,
    store: InMemoryCacheService,
}

impl SwitchableBackend {
    pub fn new() -> Self {
        Self {
            reachable: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(AtomicU64::new(0)),
            store: InMemoryCacheService::new(10_000),
        }
    }

    pub fn cut(&self) {
        self.reachable.store(false, Ordering::SeqCst);
    }

    pub fn restore(&self) {
        self.reachable.store(true, Ordering::SeqCst);
    }

    /// Calls that reached the store while it was reachable
    pub fn served(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &InMemoryCacheService {
        &self.store
    }

    fn gate(&self) -> CacheResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(CacheError::unavailable("switchable", "network unreachable"))
        }
    }
}

#[async_trait]
impl CacheBackend for SwitchableBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.gate()?;
        self.store.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.gate()?;
        self.store.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.gate()?;
        self.store.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        self.gate()?;
        self.store.delete_prefix(prefix).await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.gate()?;
        self.store.clear().await
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        amount: u32,
        limit: u32,
        window: Duration,
    ) -> CacheResult<WindowSnapshot> {
        self.gate()?;
        self.store
            .increment_with_expiry(key, amount, limit, window)
            .await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        self.gate()?;
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "switchable"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}
