//! # Structured Logging Module
//!
//! Environment-aware structured logging for the cache and rate-limit layers.
//! Console output is always on; set `RATEWARDEN_LOG_FORMAT=json` to switch the
//! console layer to JSON lines for log shipping.

use crate::config::ConfigManager;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Console rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("RATEWARDEN_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once; only the first call installs a subscriber,
/// and an already installed global subscriber is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let format = LogFormat::from_env();
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)))
        };

        let console = match format {
            LogFormat::Text => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter())
                .boxed(),
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter())
                .boxed(),
        };

        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized, keeping existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            format = ?format,
            "Structured logging initialized"
        );
    });
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a backend state change (failover or recovery)
pub fn log_backend_transition(from: &str, to: &str, reason: &str) {
    if to == crate::constants::providers::MEMORY {
        tracing::warn!(
            from = %from,
            to = %to,
            reason = %reason,
            timestamp = %Utc::now().to_rfc3339(),
            "BACKEND_TRANSITION: failing over, rate limits are per-instance until recovery"
        );
    } else {
        tracing::info!(
            from = %from,
            to = %to,
            reason = %reason,
            timestamp = %Utc::now().to_rfc3339(),
            "BACKEND_TRANSITION: distributed backend restored"
        );
    }
}

/// Log one rate-limit decision
///
/// Rejections log at info, admissions at debug.
pub fn log_rate_limit_decision(
    client: &str,
    route: &str,
    allowed: bool,
    remaining: u32,
    reset_after_seconds: u64,
    backend: &str,
) {
    if allowed {
        tracing::debug!(
            client = %client,
            route = %route,
            remaining = remaining,
            reset_after_seconds = reset_after_seconds,
            backend = %backend,
            "RATE_LIMIT: allowed"
        );
    } else {
        tracing::info!(
            client = %client,
            route = %route,
            reset_after_seconds = reset_after_seconds,
            backend = %backend,
            "RATE_LIMIT: rejected"
        );
    }
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
