#![allow(clippy::doc_markdown)] // Allow technical terms like Redis, DashMap in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Ratewarden
//!
//! Sliding-window rate limiting and a memoizing cache for multi-instance
//! services, backed by Redis with automatic failover to an in-process tier.
//!
//! ## Overview
//!
//! Every instance of a service shares one Redis. Rate-limit windows live in
//! Redis sorted sets and are updated by a single Lua script, so concurrent
//! requests across all instances can never admit more than the limit. When
//! Redis cannot be reached the [`BackendSupervisor`](cache::BackendSupervisor)
//! routes every call to the in-memory tier and keeps probing until Redis
//! answers again. While degraded, limits are enforced per instance.
//!
//! ## Module Organization
//!
//! - [`cache`] - key codec, backends, supervisor and memoizing facade
//! - [`rate_limit`] - policies, the limiter and HTTP response shapes
//! - [`config`] - layered configuration and startup validation
//! - [`system_context`] - wires one supervisor into the limiter and cache
//! - [`logging`] - structured logging bootstrap
//! - [`error`] - crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ratewarden::system_context::SystemContext;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! ratewarden::logging::init_structured_logging();
//! let context = SystemContext::new().await?;
//!
//! let decision = context.rate_limiter.check("203.0.113.7", "/api/v1/users").await;
//! if let Some(rejection) = decision.rejection() {
//!     println!("{} {:?}", rejection.status, rejection.body);
//! }
//!
//! let users = context.cache_policy("users")?;
//! let name: String = context
//!     .cache
//!     .get_or_compute(&users, 123_u64, || async { Ok::<_, std::io::Error>("Ada".to_string()) })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                                   # in-memory and failover tests
//! REDIS_URL=redis://localhost:6379/15 cargo test --features test-services
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod system_context;

pub use cache::{BackendState, BackendSupervisor, CachePolicy, KeyBuilder, MemoizingCache};
pub use config::{ConfigManager, ConfigurationError, RateWardenConfig};
pub use error::{RateWardenError, Result};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use system_context::SystemContext;
