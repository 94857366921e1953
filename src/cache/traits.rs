//! Cache backend trait definition

use super::errors::CacheResult;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Outcome of one sliding-window increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Live entries in the window after the attempt
    pub count: u64,
    /// Whether the attempt was recorded (count stayed within the limit)
    pub admitted: bool,
    /// Time until the oldest live entry leaves the window
    pub reset_after: Duration,
}

/// Trait defining cache operations
///
/// Implemented by the in-process and the distributed backend. Every
/// operation returns `CacheResult`; a miss is `Ok(None)`, and only a
/// backend that cannot be reached yields `CacheError::BackendUnavailable`.
#[async_trait]
pub trait CacheBackend: Send + Sync + Debug {
    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` on miss or expiry.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Unconditionally overwrite `key`, expiring `ttl` from now
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete a key; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Check whether a live entry exists for `key`
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Delete every key starting with `prefix`, returning how many were removed
    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64>;

    /// Drop every entry owned by this backend
    async fn clear(&self) -> CacheResult<()>;

    /// Atomic sliding-window increment
    ///
    /// Prunes entries older than `window`, then records `amount` new entries
    /// at the current time only if the live count plus `amount` stays within
    /// `limit`. The prune, count and add are one atomic unit per key.
    async fn increment_with_expiry(
        &self,
        key: &str,
        amount: u32,
        limit: u32,
        window: Duration,
    ) -> CacheResult<WindowSnapshot>;

    /// Lightweight reachability probe
    async fn health_check(&self) -> CacheResult<bool>;

    /// Get the name of the backend
    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across service instances
    fn is_distributed(&self) -> bool;
}
