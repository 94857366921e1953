//! # System Constants
//!
//! Defaults, key namespaces and wire-level names shared across the crate.

/// Key layout
pub mod keys {
    pub const SEPARATOR: char = ':';
    pub const FIELD_SEPARATOR: char = '=';

    /// Namespace for memoized values
    pub const CACHE_NAMESPACE: &str = "cache";
    /// Namespace for sliding-window records
    pub const RATE_LIMIT_NAMESPACE: &str = "rate_limit";
    /// Default outer namespace applied by the distributed backend
    pub const DEFAULT_REDIS_NAMESPACE: &str = "ratewarden";
}

/// Configuration defaults, mirroring the values the service ships with
pub mod defaults {
    pub const CACHE_TTL_SECONDS: u64 = 300;
    pub const CACHE_MAX_ENTRIES: usize = 10_000;
    pub const SWEEP_INTERVAL_MS: u64 = 5_000;

    pub const REDIS_URL: &str = "redis://localhost:6379/0";
    pub const REDIS_OPERATION_TIMEOUT_MS: u64 = 250;
    pub const REDIS_CONNECTION_TIMEOUT_MS: u64 = 1_000;
    /// Keys fetched per SCAN round trip
    pub const REDIS_SCAN_COUNT: usize = 100;

    pub const RECOVERY_PROBE_INTERVAL_MS: u64 = 5_000;

    pub const RATE_LIMIT_PER_WINDOW: u32 = 60;
    pub const AUTH_RATE_LIMIT_PER_WINDOW: u32 = 10;
    pub const RATE_LIMIT_WINDOW_SECONDS: u64 = 60;
    pub const AUTH_ROUTE_CLASS: &str = "auth";

    /// Upper bound for `window_seconds` and `ttl_seconds` (one year)
    pub const MAX_POLICY_SECONDS: i64 = 366 * 24 * 60 * 60;
}

/// HTTP-facing names used when surfacing rate-limit decisions
pub mod http {
    pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
    pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
    pub const HEADER_RESET: &str = "X-RateLimit-Reset";
    pub const HEADER_RETRY_AFTER: &str = "Retry-After";
    pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
    pub const ERROR_RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";
}

/// Backend provider names
pub mod providers {
    pub const REDIS: &str = "redis";
    pub const MEMORY: &str = "memory";
}
