//! # Memoizing Cache Facade
//!
//! `get_or_compute` returns a cached value or runs the producer, stores its
//! result for the policy's TTL and returns it.
//!
//! Values are stored as JSON. The facade never fails because of the cache:
//! read errors and undecodable entries are misses (a corrupt entry is
//! deleted), and write errors are logged and dropped. Only the producer's own
//! error is returned, and it is never cached.
//!
//! Concurrent misses for the same key each run the producer; the last write
//! wins.

use super::errors::{CacheError, CacheResult};
use super::key::{cache_key, cache_key_prefix, CacheKey, KeyBuilder, KeyPart};
use super::supervisor::BackendSupervisor;
use crate::config::{CacheConfig, ConfigResult, ConfigurationError};
use crate::constants::defaults::MAX_POLICY_SECONDS;
use crate::constants::keys::CACHE_NAMESPACE;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Key prefix and TTL for one memoized operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachePolicy {
    key_prefix: String,
    ttl_seconds: u64,
}

impl CachePolicy {
    /// Zero, negative or longer-than-a-year TTLs are
    /// [`ConfigurationError::InvalidPolicy`]
    pub fn new(key_prefix: impl Into<String>, ttl_seconds: i64) -> ConfigResult<Self> {
        let key_prefix = key_prefix.into();
        if ttl_seconds <= 0 {
            return Err(ConfigurationError::invalid_policy(
                format!("cache.{key_prefix}.ttl_seconds"),
                ttl_seconds,
                "ttl_seconds must be greater than 0",
            ));
        }
        if ttl_seconds > MAX_POLICY_SECONDS {
            return Err(ConfigurationError::invalid_policy(
                format!("cache.{key_prefix}.ttl_seconds"),
                ttl_seconds,
                format!("ttl_seconds must be at most {MAX_POLICY_SECONDS}"),
            ));
        }
        Ok(Self {
            key_prefix,
            ttl_seconds: ttl_seconds as u64,
        })
    }

    /// Policy using the configured default TTL
    pub fn with_default_ttl(
        key_prefix: impl Into<String>,
        config: &CacheConfig,
    ) -> ConfigResult<Self> {
        Self::new(key_prefix, config.default_ttl_seconds)
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Builder pre-seeded with this policy's namespace, for multi-argument keys
    pub fn key_builder(&self) -> KeyBuilder {
        KeyBuilder::new(CACHE_NAMESPACE).operation(&self.key_prefix)
    }

    /// Key for a single-argument operation
    pub fn key_for(&self, argument: impl Into<KeyPart>) -> CacheKey {
        cache_key(&self.key_prefix, argument)
    }
}

/// Memoization over the supervised cache
#[derive(Debug, Clone)]
pub struct MemoizingCache {
    supervisor: BackendSupervisor,
}

impl MemoizingCache {
    pub fn new(supervisor: BackendSupervisor) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &BackendSupervisor {
        &self.supervisor
    }

    /// Return the cached value for `argument` or compute and cache it
    ///
    /// ```rust,no_run
    /// use ratewarden::cache::{
    ///     BackendSupervisor, CachePolicy, InMemoryCacheService, MemoizingCache,
    /// };
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let supervisor = BackendSupervisor::memory_only(InMemoryCacheService::new(100));
    /// let cache = MemoizingCache::new(supervisor);
    /// let users = CachePolicy::new("users", 300)?;
    ///
    /// let name: String = cache
    ///     .get_or_compute(&users, "123", || async { Ok::<_, std::io::Error>("Ada".to_string()) })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        policy: &CachePolicy,
        argument: impl Into<KeyPart>,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = policy.key_for(argument);
        self.get_or_compute_key(policy, &key, producer).await
    }

    /// As [`get_or_compute`](Self::get_or_compute) for a key built with
    /// [`CachePolicy::key_builder`]
    pub async fn get_or_compute_key<T, E, F, Fut>(
        &self,
        policy: &CachePolicy,
        key: &CacheKey,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.lookup::<T>(key).await {
            return Ok(value);
        }

        let value = producer().await?;
        self.store(key, &value, policy.ttl()).await;
        Ok(value)
    }

    /// Remove the memoized value for one argument
    pub async fn invalidate(
        &self,
        policy: &CachePolicy,
        argument: impl Into<KeyPart>,
    ) -> CacheResult<()> {
        let key = policy.key_for(argument);
        self.supervisor.delete(key.as_str()).await
    }

    /// Remove every memoized value of `policy`, returning how many were removed
    pub async fn invalidate_prefix(&self, policy: &CachePolicy) -> CacheResult<u64> {
        let prefix = cache_key_prefix(policy.key_prefix());
        let removed = self.supervisor.delete_prefix(&prefix).await?;
        debug!(prefix = %prefix, removed = removed, "Cache INVALIDATE prefix");
        Ok(removed)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = match self.supervisor.get(key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = %key, "Cache MISS");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => {
                debug!(key = %key, "Cache HIT");
                Some(value)
            }
            Err(e) => {
                let error = CacheError::from(e);
                warn!(key = %key, error = %error, "Undecodable cache entry, deleting");
                if let Err(e) = self.supervisor.delete(key.as_str()).await {
                    debug!(key = %key, error = %e, "Failed to delete undecodable entry");
                }
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Value not serializable, skipping cache write");
                return;
            }
        };

        match self.supervisor.set(key.as_str(), &bytes, ttl).await {
            Ok(()) => debug!(key = %key, ttl_seconds = ttl.as_secs(), "Cache SET"),
            Err(e) => warn!(key = %key, error = %e, "Cache write failed"),
        }
    }
}
