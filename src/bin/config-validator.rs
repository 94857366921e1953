//! # Ratewarden Configuration Validator
//!
//! Command-line tool for validating Ratewarden configuration across
//! environments. Catches invalid rate-limit and cache policies before a
//! service starts with them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ratewarden::config::{ConfigManager, RateWardenConfig};
use ratewarden::rate_limit::PolicyRegistry;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate Ratewarden configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, env = "RATEWARDEN_ENV", default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate everything and print the effective settings
    All,

    /// Print the effective rate-limit policy for each route
    Policies {
        /// Extra routes to resolve besides the configured mappings
        routes: Vec<String>,
    },

    /// Print the merged configuration as JSON, credentials redacted
    Show,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = load(&cli).and_then(|manager| match &cli.command {
        Some(Commands::All) | None => validate_all_config(&manager),
        Some(Commands::Policies { routes }) => show_policies(manager.config(), routes),
        Some(Commands::Show) => show_config(&manager),
    });

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("Configuration invalid: {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    println!("Validating Ratewarden configuration");
    println!("Environment: {}", cli.environment);
    if let Some(dir) = &cli.config_dir {
        println!("Config Directory: {}", dir.display());
    }
    println!();

    let manager =
        ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
            .with_context(|| format!("loading configuration for '{}'", cli.environment))?;
    println!("[ok] Configuration loaded and validated");
    Ok(manager)
}

fn validate_all_config(manager: &ConfigManager) -> Result<()> {
    let config = manager.config();
    validate_cache_config(config);
    validate_redis_config(manager);
    show_policies(config, &[])?;

    println!("\nAll configuration validation checks passed!");
    Ok(())
}

fn validate_cache_config(config: &RateWardenConfig) {
    println!("Cache:");
    println!("   default TTL: {}s", config.cache.default_ttl_seconds);
    println!("   in-memory capacity: {} entries", config.cache.max_entries);
    println!("   sweep interval: {}ms", config.cache.sweep_interval_ms);
}

fn validate_redis_config(manager: &ConfigManager) {
    let config = manager.config();
    println!("Distributed backend:");
    if config.distributed_enabled() {
        let debug = manager.debug_config();
        println!("   url: {}", debug["redis"]["url"].as_str().unwrap_or("<redacted>"));
        println!("   namespace: {}", config.redis.key_namespace);
        println!(
            "   timeouts: operation {}ms, connect {}ms",
            config.redis.operation_timeout_ms, config.redis.connection_timeout_ms
        );
        println!(
            "   recovery probe every {}ms",
            config.supervisor.recovery_probe_interval_ms
        );
    } else {
        println!("   disabled, running in-memory only");
    }
}

fn show_policies(config: &RateWardenConfig, extra_routes: &[String]) -> Result<()> {
    let registry: PolicyRegistry = config.rate_limit.policy_registry()?;

    println!(
        "Rate limiting: {}",
        if config.rate_limit.enabled { "enabled" } else { "disabled" }
    );
    let default = registry.default_policy();
    println!(
        "   default: {} per {}s",
        default.limit(),
        default.window_seconds()
    );
    for name in registry.class_names() {
        if let Some(policy) = registry.class(name) {
            println!(
                "   class {name}: {} per {}s",
                policy.limit(),
                policy.window_seconds()
            );
        }
    }
    for (route, class) in registry.routes() {
        println!("   route {route} -> {class}");
    }
    for route in extra_routes {
        let policy = registry.policy_for(route);
        println!(
            "   {route} resolves to {} per {}s ({})",
            policy.limit(),
            policy.window_seconds(),
            registry.class_for(route).unwrap_or("default")
        );
    }
    Ok(())
}

fn show_config(manager: &ConfigManager) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(())
}
