//! Cache backend implementations

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryCacheService;
pub use self::redis::RedisCacheService;
