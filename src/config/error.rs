//! Configuration Error Types
//!
//! Errors raised while loading and validating configuration. Every variant
//! here is fatal at startup; nothing in this module is recoverable at runtime.

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Layered sources could not be read or deserialized
    #[error("Failed to load configuration: {error}")]
    LoadFailed { error: String },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// A rate-limit or cache policy number that is zero or negative
    #[error("Invalid policy configuration '{field}' = {value}: {reason}")]
    InvalidPolicy {
        field: String,
        value: i64,
        reason: String,
    },

    /// A route mapped to a policy class that does not exist
    #[error("Route '{route}' references unknown rate limit class '{class}'")]
    UnknownRouteClass { route: String, class: String },
}

impl ConfigurationError {
    pub fn load_failed<E: std::fmt::Display>(error: E) -> Self {
        Self::LoadFailed {
            error: error.to_string(),
        }
    }

    /// Create a missing required field error
    pub fn missing_required_field<F: Into<String>, C: Into<String>>(field: F, context: C) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    pub fn invalid_policy<F: Into<String>, R: Into<String>>(
        field: F,
        value: i64,
        reason: R,
    ) -> Self {
        Self::InvalidPolicy {
            field: field.into(),
            value,
            reason: reason.into(),
        }
    }

    /// Whether this is the policy-number class of failure
    pub fn is_invalid_policy(&self) -> bool {
        matches!(self, Self::InvalidPolicy { .. })
    }
}

impl From<::config::ConfigError> for ConfigurationError {
    fn from(e: ::config::ConfigError) -> Self {
        Self::load_failed(e)
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
