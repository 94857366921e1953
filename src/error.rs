//! Error types for the Ratewarden system.

use crate::cache::errors::CacheError;
use crate::cache::key::KeyParseError;
use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateWardenError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Key error: {0}")]
    Key(#[from] KeyParseError),
}

pub type Result<T> = std::result::Result<T, RateWardenError>;
