//! # Rate Limiting
//!
//! Sliding-window limits per `(client, route)`, with route classes mapping
//! groups of routes onto shared policies.

pub mod limiter;
pub mod policy;
pub mod response;

pub use limiter::{RateLimitDecision, RateLimiter};
pub use policy::{PolicyRegistry, RateLimitPolicy};
pub use response::{RateLimitExceededBody, RateLimitRejection, RetryDetails};
