//! In-memory cache provider
//!
//! Process-local store built on `DashMap`, whose sharded locks give per-key
//! mutual exclusion without a global lock. This is the guaranteed-available
//! tier: no operation here ever returns `CacheError::BackendUnavailable`.
//!
//! **Important**: state is NOT shared between processes. While the
//! supervisor routes here, rate limits and cached values are per-instance.
//!
//! Expiry is observed lazily on read and enforced physically by a background
//! sweep (see [`InMemoryCacheService::spawn_sweeper`]). Timestamps come from
//! `tokio::time::Instant`, so paused-clock tests drive expiry deterministically.

use crate::cache::errors::CacheResult;
use crate::cache::traits::{CacheBackend, WindowSnapshot};
use crate::config::CacheConfig;
use crate::constants::{defaults, providers};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Timestamps of attempts recorded for one rate-limit key
#[derive(Debug)]
struct WindowRecord {
    hits: VecDeque<Instant>,
    window: Duration,
}

impl WindowRecord {
    fn new(window: Duration) -> Self {
        Self {
            hits: VecDeque::new(),
            window,
        }
    }

    /// Drop hits that are no longer strictly inside the trailing window
    fn prune(&mut self, now: Instant) {
        let Some(window_start) = now.checked_sub(self.window) else {
            return;
        };
        while matches!(self.hits.front(), Some(ts) if *ts <= window_start) {
            self.hits.pop_front();
        }
    }

    fn reset_after(&self, now: Instant) -> Duration {
        self.hits
            .front()
            .and_then(|oldest| oldest.checked_add(self.window))
            .map(|leaves_at| leaves_at.saturating_duration_since(now))
            .unwrap_or(self.window)
    }
}

/// Longest span an entry or window is kept, so deadlines never overflow
fn retention_limit() -> Duration {
    Duration::from_secs(defaults::MAX_POLICY_SECONDS as u64)
}

#[derive(Debug)]
struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
    windows: DashMap<String, WindowRecord>,
    max_entries: usize,
}

impl MemoryStore {
    /// Remove expired entries and emptied windows, returning the number removed
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        self.windows.retain(|_, record| {
            record.prune(now);
            !record.hits.is_empty()
        });

        removed
    }

    /// Bring the store back under `max_entries` after an insert
    ///
    /// Expired entries go first, then the entries closest to expiry. One
    /// pass evicts down to the low watermark so a full store does not scan
    /// on every insert. `keep` is never evicted.
    fn enforce_capacity(&self, keep: &str) {
        if self.entries.len() <= self.max_entries {
            return;
        }

        self.sweep();
        let excess = self.entries.len().saturating_sub(self.low_watermark());
        if excess == 0 {
            return;
        }

        let mut candidates: Vec<(Instant, String)> = self
            .entries
            .iter()
            .filter(|entry| entry.key() != keep)
            .map(|entry| (entry.value().expires_at, entry.key().clone()))
            .collect();
        candidates.sort_unstable();

        for (_, victim) in candidates.into_iter().take(excess) {
            self.entries.remove(&victim);
            debug!(key = %victim, "Cache EVICT (memory, capacity)");
        }
    }

    fn low_watermark(&self) -> usize {
        self.max_entries - self.max_entries / 10
    }
}

/// In-memory cache service
///
/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct InMemoryCacheService {
    store: Arc<MemoryStore>,
}

impl InMemoryCacheService {
    /// Create an empty store holding at most `max_entries` cached values
    ///
    /// No sweeper is started; call [`spawn_sweeper`](Self::spawn_sweeper)
    /// from within a tokio runtime to bound memory from never-read keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(MemoryStore {
                entries: DashMap::new(),
                windows: DashMap::new(),
                max_entries: max_entries.max(1),
            }),
        }
    }

    /// Create from configuration and start the background sweep
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &CacheConfig) -> Self {
        let service = Self::new(config.max_entries);
        service.spawn_sweeper(config.sweep_interval());
        debug!(
            max_entries = config.max_entries,
            sweep_interval_ms = config.sweep_interval_ms,
            "In-memory cache service created"
        );
        service
    }

    /// Periodically remove expired entries
    ///
    /// The task holds only a weak reference and exits once every clone of
    /// this service has been dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store: Weak<MemoryStore> = Arc::downgrade(&self.store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("In-memory cache dropped, sweeper exiting");
                    break;
                };
                let removed = store.sweep();
                if removed > 0 {
                    debug!(removed = removed, "In-memory cache sweep");
                }
            }
        })
    }

    /// Run one sweep synchronously
    pub fn purge_expired(&self) -> usize {
        self.store.sweep()
    }

    /// Number of cached values, expired-but-unswept included
    pub fn entry_count(&self) -> usize {
        self.store.entries.len()
    }

    /// Number of rate-limit keys with a window record
    pub fn window_count(&self) -> usize {
        self.store.windows.len()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        {
            match self.store.entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    debug!(key = key, "Cache HIT (memory)");
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => {
                    debug!(key = key, "Cache MISS (memory)");
                    return Ok(None);
                }
            }
        }

        // Shard guard is released above; re-check under the write lock so a
        // concurrent fresh `set` is not removed.
        self.store
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now));
        debug!(key = key, "Cache MISS (memory, expired)");
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.store.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl.min(retention_limit()),
            },
        );
        self.store.enforce_capacity(key);
        debug!(key = key, ttl_seconds = ttl.as_secs(), "Cache SET (memory)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.entries.remove(key);
        self.store.windows.remove(key);
        debug!(key = key, "Cache DEL (memory)");
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let mut deleted: u64 = 0;
        self.store.entries.retain(|key, _| {
            let keep = !key.starts_with(prefix);
            if !keep {
                deleted += 1;
            }
            keep
        });
        self.store.windows.retain(|key, _| {
            let keep = !key.starts_with(prefix);
            if !keep {
                deleted += 1;
            }
            keep
        });
        debug!(prefix = prefix, deleted = deleted, "Cache prefix DEL (memory)");
        Ok(deleted)
    }

    async fn clear(&self) -> CacheResult<()> {
        self.store.entries.clear();
        self.store.windows.clear();
        debug!("Cache CLEAR (memory)");
        Ok(())
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        amount: u32,
        limit: u32,
        window: Duration,
    ) -> CacheResult<WindowSnapshot> {
        let now = Instant::now();
        let window = window.min(retention_limit());

        // The entry guard holds the shard write lock for the whole
        // prune-count-append sequence.
        let mut record = self
            .store
            .windows
            .entry(key.to_string())
            .or_insert_with(|| WindowRecord::new(window));
        record.window = window;
        record.prune(now);

        let live = record.hits.len() as u64;
        let admitted = live + u64::from(amount) <= u64::from(limit);
        if admitted {
            record.hits.extend(std::iter::repeat(now).take(amount as usize));
        }

        let snapshot = WindowSnapshot {
            count: record.hits.len() as u64,
            admitted,
            reset_after: record.reset_after(now),
        };
        drop(record);

        debug!(
            key = key,
            count = snapshot.count,
            admitted = snapshot.admitted,
            "Window INCR (memory)"
        );
        Ok(snapshot)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        providers::MEMORY
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_memory_get_returns_none_on_miss() {
        let svc = InMemoryCacheService::new(100);
        assert_eq!(svc.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_set_and_get() {
        let svc = InMemoryCacheService::new(100);
        svc.set("k", b"value", Duration::from_secs(60)).await.unwrap();
        assert_eq!(svc.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert!(svc.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_set_overwrites() {
        let svc = InMemoryCacheService::new(100);
        svc.set("k", b"one", Duration::from_secs(60)).await.unwrap();
        svc.set("k", b"two", Duration::from_secs(60)).await.unwrap();
        assert_eq!(svc.get("k").await.unwrap(), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_delete_is_idempotent() {
        let svc = InMemoryCacheService::new(100);
        svc.set("k", b"v", Duration::from_secs(60)).await.unwrap();
        svc.delete("k").await.unwrap();
        svc.delete("k").await.unwrap();
        assert!(svc.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_lazy_expiry_removes_entry() {
        let svc = InMemoryCacheService::new(100);
        svc.set("k", b"v", Duration::from_secs(1)).await.unwrap();
        assert!(svc.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_millis(1001)).await;

        assert!(svc.get("k").await.unwrap().is_none());
        assert_eq!(svc.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_sweeper_removes_unread_entries() {
        let svc = InMemoryCacheService::new(100);
        let _sweeper = svc.spawn_sweeper(Duration::from_secs(5));
        svc.set("never-read", b"v", Duration::from_secs(1)).await.unwrap();
        assert_eq!(svc.entry_count(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(svc.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_capacity_eviction_prefers_soonest_expiry() {
        let svc = InMemoryCacheService::new(2);
        svc.set("short", b"1", Duration::from_secs(10)).await.unwrap();
        svc.set("long", b"2", Duration::from_secs(100)).await.unwrap();
        svc.set("new", b"3", Duration::from_secs(50)).await.unwrap();

        assert_eq!(svc.entry_count(), 2);
        assert!(svc.get("short").await.unwrap().is_none());
        assert!(svc.get("long").await.unwrap().is_some());
        assert!(svc.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_full_store_evicts_in_batches() {
        let svc = InMemoryCacheService::new(10);
        for i in 0..10 {
            svc.set(&format!("k{i}"), b"v", Duration::from_secs(100 + i))
                .await
                .unwrap();
        }
        assert_eq!(svc.entry_count(), 10);

        svc.set("k10", b"v", Duration::from_secs(1_000)).await.unwrap();
        // evicted down to the low watermark, soonest expiry first
        assert_eq!(svc.entry_count(), 9);
        assert!(svc.get("k0").await.unwrap().is_none());
        assert!(svc.get("k1").await.unwrap().is_none());
        assert!(svc.get("k10").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_concurrent_writers_respect_capacity() {
        let svc = InMemoryCacheService::new(50);
        let writers = (0..8).map(|w| {
            let svc = svc.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    svc.set(&format!("w{w}:{i}"), b"v", Duration::from_secs(60))
                        .await
                        .unwrap();
                }
            })
        });
        for writer in futures::future::join_all(writers).await {
            writer.unwrap();
        }
        assert!(svc.entry_count() <= 50);
    }

    #[tokio::test]
    async fn test_memory_oversized_durations_do_not_overflow() {
        let svc = InMemoryCacheService::new(10);
        svc.set("forever", b"v", Duration::MAX).await.unwrap();
        assert!(svc.get("forever").await.unwrap().is_some());

        let snap = svc
            .increment_with_expiry("rl", 1, 5, Duration::MAX)
            .await
            .unwrap();
        assert!(snap.admitted);
        assert!(snap.reset_after <= retention_limit());
    }

    #[tokio::test]
    async fn test_memory_delete_prefix() {
        let svc = InMemoryCacheService::new(100);
        for i in 0..3 {
            svc.set(&format!("cache:users:{i}"), b"v", Duration::from_secs(60))
                .await
                .unwrap();
        }
        svc.set("cache:geo:1", b"v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(svc.delete_prefix("cache:users:").await.unwrap(), 3);
        assert!(svc.get("cache:geo:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_increment_admits_up_to_limit() {
        let svc = InMemoryCacheService::new(100);
        for expected in 1..=3 {
            let snap = svc.increment_with_expiry("rl", 1, 3, WINDOW).await.unwrap();
            assert!(snap.admitted);
            assert_eq!(snap.count, expected);
        }
        let snap = svc.increment_with_expiry("rl", 1, 3, WINDOW).await.unwrap();
        assert!(!snap.admitted);
        assert_eq!(snap.count, 3);
    }

    #[tokio::test]
    async fn test_memory_increment_amount_is_all_or_nothing() {
        let svc = InMemoryCacheService::new(100);
        let snap = svc.increment_with_expiry("rl", 4, 5, WINDOW).await.unwrap();
        assert!(snap.admitted);
        assert_eq!(snap.count, 4);

        let snap = svc.increment_with_expiry("rl", 2, 5, WINDOW).await.unwrap();
        assert!(!snap.admitted);
        assert_eq!(snap.count, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_window_slides() {
        let svc = InMemoryCacheService::new(100);
        let window = Duration::from_secs(10);

        svc.increment_with_expiry("rl", 1, 2, window).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        svc.increment_with_expiry("rl", 1, 2, window).await.unwrap();

        let rejected = svc.increment_with_expiry("rl", 1, 2, window).await.unwrap();
        assert!(!rejected.admitted);
        assert_eq!(rejected.reset_after, Duration::from_secs(6));

        // first hit leaves the window, second is still live
        tokio::time::advance(Duration::from_secs(7)).await;
        let snap = svc.increment_with_expiry("rl", 1, 2, window).await.unwrap();
        assert!(snap.admitted);
        assert_eq!(snap.count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_sweep_drops_empty_windows() {
        let svc = InMemoryCacheService::new(100);
        svc.increment_with_expiry("rl", 1, 2, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(svc.window_count(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        svc.purge_expired();
        assert_eq!(svc.window_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_provider_traits() {
        let svc = InMemoryCacheService::new(1);
        assert_eq!(svc.provider_name(), "memory");
        assert!(!svc.is_distributed());
        assert!(svc.health_check().await.unwrap());
    }
}
