//! # Backend Supervisor
//!
//! Owns the distributed backend and the in-memory tier and decides, per
//! call, which one serves it.
//!
//! ## State
//!
//! | State      | Routes to   | Left by                          |
//! |------------|-------------|----------------------------------|
//! | `Healthy`  | distributed | any `BackendUnavailable`         |
//! | `Degraded` | memory      | a successful recovery probe      |
//!
//! The state is a single `AtomicU8`. Every operation loads it once, so a
//! caller sees either the old or the new routing, never a mix. The call that
//! observed the failure is retried on the memory tier, so callers never see
//! `BackendUnavailable`.
//!
//! While degraded, one background task probes the distributed backend every
//! `recovery_probe_interval`. The task holds only a `Weak` reference and
//! exits when the supervisor is dropped.
//!
//! Without a distributed backend the supervisor stays `Healthy` and routes
//! everything to memory.

use super::errors::{CacheError, CacheResult};
use super::providers::{InMemoryCacheService, RedisCacheService};
use super::traits::{CacheBackend, WindowSnapshot};
use crate::config::RateWardenConfig;
use crate::constants::providers;
use crate::logging::log_backend_transition;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Health of the distributed backend as seen by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    Healthy = 0,
    Degraded = 1,
}

impl From<u8> for BackendState {
    fn from(value: u8) -> Self {
        match value {
            0 => BackendState::Healthy,
            _ => BackendState::Degraded,
        }
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendState::Healthy => f.write_str("healthy"),
            BackendState::Degraded => f.write_str("degraded"),
        }
    }
}

#[derive(Debug, Default)]
struct AtomicSupervisorMetrics {
    failovers: AtomicU64,
    recoveries: AtomicU64,
    distributed_errors: AtomicU64,
    probes: AtomicU64,
}

impl AtomicSupervisorMetrics {
    fn snapshot(&self) -> SupervisorMetrics {
        SupervisorMetrics {
            failovers: self.failovers.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            distributed_errors: self.distributed_errors.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time supervisor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorMetrics {
    /// Healthy -> Degraded transitions
    pub failovers: u64,
    /// Degraded -> Healthy transitions
    pub recoveries: u64,
    /// `BackendUnavailable` errors returned by the distributed backend
    pub distributed_errors: u64,
    /// Recovery probes run, scheduled or on demand
    pub probes: u64,
}

/// Snapshot returned by [`BackendSupervisor::health_report`]
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: BackendState,
    pub active_backend: &'static str,
    pub distributed_configured: bool,
    /// Result of a live ping; `None` when no distributed backend is configured
    pub distributed_reachable: Option<bool>,
    pub memory_entries: usize,
    pub metrics: SupervisorMetrics,
}

#[derive(Debug)]
struct SupervisorInner {
    distributed: Option<Arc<dyn CacheBackend>>,
    memory: InMemoryCacheService,
    state: AtomicU8,
    probe_interval: Duration,
    probe_running: AtomicBool,
    probe_handle: Mutex<Option<JoinHandle<()>>>,
    metrics: AtomicSupervisorMetrics,
}

impl SupervisorInner {
    fn state(&self) -> BackendState {
        BackendState::from(self.state.load(Ordering::Acquire))
    }

    /// The distributed backend when it should serve this call
    fn routed_distributed(&self) -> Option<&Arc<dyn CacheBackend>> {
        match self.state() {
            BackendState::Healthy => self.distributed.as_ref(),
            BackendState::Degraded => None,
        }
    }

    fn distributed_name(&self) -> &'static str {
        self.distributed
            .as_ref()
            .map(|d| d.provider_name())
            .unwrap_or(providers::REDIS)
    }

    fn record_failure(self: &Arc<Self>, operation: &'static str, error: &CacheError) {
        self.metrics
            .distributed_errors
            .fetch_add(1, Ordering::Relaxed);

        let switched = self
            .state
            .compare_exchange(
                BackendState::Healthy as u8,
                BackendState::Degraded as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if switched {
            self.metrics.failovers.fetch_add(1, Ordering::Relaxed);
            log_backend_transition(self.distributed_name(), providers::MEMORY, &error.to_string());
            warn!(
                operation = operation,
                error = %error,
                probe_interval_ms = self.probe_interval.as_millis() as u64,
                "Distributed cache unavailable, routing to in-memory tier"
            );
        } else {
            debug!(
                operation = operation,
                error = %error,
                "Distributed cache error while already degraded"
            );
        }

        self.ensure_probe();
    }

    /// Start the recovery task unless one is already running
    fn ensure_probe(self: &Arc<Self>) {
        if self.distributed.is_none() {
            return;
        }
        if self
            .probe_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let weak: Weak<SupervisorInner> = Arc::downgrade(self);
        let interval = self.probe_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if inner.ping().await {
                    // cleared before recovering so a failure racing the
                    // switch can always start a fresh probe
                    inner.probe_running.store(false, Ordering::Release);
                    inner.recover().await;
                    break;
                }
            }
        });

        *self.probe_handle.lock() = Some(handle);
    }

    async fn ping(&self) -> bool {
        let Some(distributed) = self.distributed.as_ref() else {
            return false;
        };
        self.metrics.probes.fetch_add(1, Ordering::Relaxed);
        match distributed.health_check().await {
            Ok(true) => true,
            Ok(false) => {
                debug!("Recovery probe: distributed cache not ready");
                false
            }
            Err(e) => {
                debug!(error = %e, "Recovery probe failed");
                false
            }
        }
    }

    async fn recover(&self) -> bool {
        if self.state() != BackendState::Degraded {
            return false;
        }

        // degraded-period entries are instance-local; cleared before routing
        // flips back
        if let Err(e) = self.memory.clear().await {
            debug!(error = %e, "Failed to clear in-memory tier before recovery");
        }

        let switched = self
            .state
            .compare_exchange(
                BackendState::Degraded as u8,
                BackendState::Healthy as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if switched {
            self.metrics.recoveries.fetch_add(1, Ordering::Relaxed);
            log_backend_transition(
                providers::MEMORY,
                self.distributed_name(),
                "recovery probe succeeded",
            );
            info!("Distributed cache recovered, routing restored");
        }
        switched
    }
}

impl Drop for SupervisorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.probe_handle.get_mut().take() {
            handle.abort();
        }
    }
}

/// Routes cache and rate-limit operations to the healthy backend
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct BackendSupervisor {
    inner: Arc<SupervisorInner>,
}

impl BackendSupervisor {
    /// Supervise an optional distributed backend with `memory` as fallback
    pub fn new(
        distributed: Option<Arc<dyn CacheBackend>>,
        memory: InMemoryCacheService,
        probe_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                distributed,
                memory,
                state: AtomicU8::new(BackendState::Healthy as u8),
                probe_interval,
                probe_running: AtomicBool::new(false),
                probe_handle: Mutex::new(None),
                metrics: AtomicSupervisorMetrics::default(),
            }),
        }
    }

    /// In-memory only; never fails over
    pub fn memory_only(memory: InMemoryCacheService) -> Self {
        Self::new(
            None,
            memory,
            Duration::from_millis(crate::constants::defaults::RECOVERY_PROBE_INTERVAL_MS),
        )
    }

    /// Build from configuration with graceful degradation
    ///
    /// A disabled or unparseable Redis configuration yields an in-memory-only
    /// supervisor. A Redis that cannot be reached at startup yields a
    /// supervisor that starts `Degraded` and probes for recovery. Startup
    /// never fails because of the cache.
    pub async fn from_config(config: &RateWardenConfig) -> Self {
        let memory = InMemoryCacheService::from_config(&config.cache);
        let probe_interval = config.supervisor.recovery_probe_interval();

        if !config.distributed_enabled() {
            info!("Distributed cache disabled by configuration, running in-memory only");
            return Self::new(None, memory, probe_interval);
        }

        let redis = match RedisCacheService::from_config(&config.redis) {
            Ok(redis) => redis,
            Err(e) => {
                warn!(
                    error = %e,
                    "Invalid Redis configuration, running in-memory only"
                );
                return Self::new(None, memory, probe_interval);
            }
        };

        let connected = redis.connect().await;
        let supervisor = Self::new(Some(Arc::new(redis)), memory, probe_interval);

        match connected {
            Ok(()) => info!(
                backend = providers::REDIS,
                "Distributed cache provider initialized successfully"
            ),
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis at startup, starting degraded"
                );
                supervisor.inner.record_failure("connect", &e);
            }
        }

        supervisor
    }

    pub fn state(&self) -> BackendState {
        self.inner.state()
    }

    pub fn is_degraded(&self) -> bool {
        self.state() == BackendState::Degraded
    }

    pub fn distributed_configured(&self) -> bool {
        self.inner.distributed.is_some()
    }

    /// Provider name of the backend the next call will use
    pub fn active_backend(&self) -> &'static str {
        match self.inner.routed_distributed() {
            Some(distributed) => distributed.provider_name(),
            None => self.inner.memory.provider_name(),
        }
    }

    /// The in-memory tier
    pub fn memory(&self) -> &InMemoryCacheService {
        &self.inner.memory
    }

    pub fn metrics(&self) -> SupervisorMetrics {
        self.inner.metrics.snapshot()
    }

    /// Run one recovery probe now instead of waiting for the next interval
    ///
    /// Returns whether the distributed backend answered. A successful probe
    /// while degraded restores routing immediately.
    pub async fn probe_now(&self) -> bool {
        let reachable = self.inner.ping().await;
        if reachable && self.is_degraded() {
            self.inner.recover().await;
        }
        reachable
    }

    /// State, routing and reachability, pinging the distributed backend live
    pub async fn health_report(&self) -> HealthReport {
        let distributed_reachable = match self.inner.distributed.as_ref() {
            Some(distributed) => Some(distributed.health_check().await.unwrap_or(false)),
            None => None,
        };

        HealthReport {
            state: self.state(),
            active_backend: self.active_backend(),
            distributed_configured: self.distributed_configured(),
            distributed_reachable,
            memory_entries: self.inner.memory.entry_count(),
            metrics: self.metrics(),
        }
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        if let Some(distributed) = self.inner.routed_distributed() {
            match distributed.get(key).await {
                Err(e) if e.is_unavailable() => self.inner.record_failure("get", &e),
                other => return other,
            }
        }
        self.inner.memory.get(key).await
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        if let Some(distributed) = self.inner.routed_distributed() {
            match distributed.set(key, value, ttl).await {
                Err(e) if e.is_unavailable() => self.inner.record_failure("set", &e),
                other => return other,
            }
        }
        self.inner.memory.set(key, value, ttl).await
    }

    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        if let Some(distributed) = self.inner.routed_distributed() {
            match distributed.delete(key).await {
                Err(e) if e.is_unavailable() => self.inner.record_failure("delete", &e),
                other => return other,
            }
        }
        self.inner.memory.delete(key).await
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        if let Some(distributed) = self.inner.routed_distributed() {
            match distributed.exists(key).await {
                Err(e) if e.is_unavailable() => self.inner.record_failure("exists", &e),
                other => return other,
            }
        }
        self.inner.memory.exists(key).await
    }

    pub async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        if let Some(distributed) = self.inner.routed_distributed() {
            match distributed.delete_prefix(prefix).await {
                Err(e) if e.is_unavailable() => self.inner.record_failure("delete_prefix", &e),
                other => return other,
            }
        }
        self.inner.memory.delete_prefix(prefix).await
    }

    pub async fn clear(&self) -> CacheResult<()> {
        if let Some(distributed) = self.inner.routed_distributed() {
            match distributed.clear().await {
                Err(e) if e.is_unavailable() => self.inner.record_failure("clear", &e),
                other => return other,
            }
        }
        self.inner.memory.clear().await
    }

    pub async fn increment_with_expiry(
        &self,
        key: &str,
        amount: u32,
        limit: u32,
        window: Duration,
    ) -> CacheResult<WindowSnapshot> {
        if let Some(distributed) = self.inner.routed_distributed() {
            match distributed
                .increment_with_expiry(key, amount, limit, window)
                .await
            {
                Err(e) if e.is_unavailable() => {
                    self.inner.record_failure("increment_with_expiry", &e)
                }
                other => return other,
            }
        }
        self.inner
            .memory
            .increment_with_expiry(key, amount, limit, window)
            .await
    }
}
