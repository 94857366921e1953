//! # Cache Module
//!
//! Two-tier cache with automatic failover, plus the memoizing facade built
//! on top of it.
//!
//! ## Architecture
//!
//! ```text
//! MemoizingCache / RateLimiter
//!   └── BackendSupervisor            <- owns routing state, fails over, probes
//!         ├── RedisCacheService      <- shared across instances, Lua sliding window
//!         └── InMemoryCacheService   <- DashMap tier, always available
//! ```
//!
//! ## Design Decisions
//!
//! - **Trait objects at the backend seam**: the supervisor holds
//!   `Arc<dyn CacheBackend>` so any reachable store can stand in for Redis
//! - **Typed failure signal**: only `CacheError::BackendUnavailable` triggers
//!   failover; misses are `Ok(None)`
//! - **SCAN for prefixes**: non-blocking key iteration (never uses KEYS)
//! - **Structured keys**: [`KeyBuilder`] escapes every segment, so keys from
//!   independent instances agree without coordination

pub mod errors;
pub mod key;
pub mod memoize;
pub mod providers;
pub mod supervisor;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use key::{
    cache_key, cache_key_prefix, parse_key, rate_limit_key, CacheKey, KeyBuilder, KeyPart,
};
pub use memoize::{CachePolicy, MemoizingCache};
pub use providers::{InMemoryCacheService, RedisCacheService};
pub use supervisor::{BackendState, BackendSupervisor, HealthReport, SupervisorMetrics};
pub use traits::{CacheBackend, WindowSnapshot};
