//! Configuration Loader
//!
//! Environment-aware loading built on the `config` crate. Sources are
//! layered, later ones overriding earlier ones:
//!
//! 1. built-in defaults ([`RateWardenConfig::default`])
//! 2. `<dir>/ratewarden.toml` (optional)
//! 3. `<dir>/ratewarden.<environment>.toml` (optional)
//! 4. environment variables `RATEWARDEN__SECTION__KEY`
//!
//! The merged result is validated before it is handed out, so an invalid
//! policy stops startup.

use super::error::{ConfigResult, ConfigurationError};
use super::RateWardenConfig;
use ::config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "RATEWARDEN";
const ENV_SEPARATOR: &str = "__";
const BASE_FILE_STEM: &str = "ratewarden";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: RateWardenConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            distributed = config.distributed_enabled(),
            rate_limit_enabled = config.rate_limit.enabled,
            route_classes = config.rate_limit.classes.len(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Build a manager around an already constructed configuration
    pub fn from_config(
        config: RateWardenConfig,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &RateWardenConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration with the Redis URL credentials masked, for logging
    pub fn debug_config(&self) -> serde_json::Value {
        let mut sanitized = self.config.clone();
        sanitized.redis.url = crate::cache::providers::redis::redact_url(&sanitized.redis.url);
        serde_json::to_value(&sanitized).unwrap_or(serde_json::Value::Null)
    }

    /// Detect the current environment name
    pub fn detect_environment() -> String {
        env::var("RATEWARDEN_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<RateWardenConfig> {
        let base_file = config_directory.join(format!("{BASE_FILE_STEM}.toml"));
        let env_file = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.toml"));

        debug!(
            base_file = %base_file.display(),
            base_exists = base_file.is_file(),
            env_file = %env_file.display(),
            env_exists = env_file.is_file(),
            "Resolving configuration sources"
        );

        let defaults = Config::try_from(&RateWardenConfig::default())
            .map_err(ConfigurationError::load_failed)?;

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file).format(FileFormat::Toml).required(false))
            .add_source(File::from(env_file).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        Ok(merged.try_deserialize::<RateWardenConfig>()?)
    }
}
