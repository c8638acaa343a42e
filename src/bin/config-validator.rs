//! # Resilience Configuration Validator
//!
//! Command-line tool for validating resilience configuration files per environment
//! before a trading service starts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use trade_resilience::config::{ConfigManager, ResilienceConfig};
use trade_resilience::ResourceKind;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate resilience configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Ignore RESILIENCE__* environment overrides
    #[arg(long)]
    files_only: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every section and print a summary
    All,

    /// Print the effective configuration as sanitized JSON
    Show,

    /// List environment overlay files in the configuration directory
    Environments,
}

fn main() {
    let cli = Cli::parse();

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

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all(&cli),
        Some(Commands::Show) => show_config(&cli),
        Some(Commands::Environments) => list_environments(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>, Box<dyn std::error::Error>> {
    let manager = if cli.files_only {
        ConfigManager::load_files_only(cli.config_dir.clone(), &cli.environment)
    } else {
        ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
    };

    match manager {
        Ok(manager) => Ok(manager),
        Err(e) => {
            println!("❌ Failed to load configuration: {e}");
            Err(Box::new(e))
        }
    }
}

fn validate_all(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔧 Validating Resilience Configuration");
    println!("Environment: {}", cli.environment);

    let manager = load(cli)?;
    println!("Config Directory: {}", manager.config_directory().display());
    println!("✅ Configuration loaded and validated\n");

    print_summary(manager.config());

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn print_summary(config: &ResilienceConfig) {
    let retry = &config.retry;
    println!("📋 Retry:");
    println!("   max_retries: {}", retry.max_retries);
    println!("   base_delay: {:?}", retry.base_delay());
    println!("   max_delay: {:?}", retry.max_delay());
    println!("   backoff_multiplier: {}", retry.backoff_multiplier);

    let breaker = &config.circuit_breaker;
    println!("📋 Circuit breaker:");
    println!("   failure_threshold: {}", breaker.failure_threshold);
    println!("   cooldown: {:?}", breaker.cooldown());

    println!("📋 Resources (poll every {:?}):", config.resources.poll_interval());
    for kind in ResourceKind::ALL {
        let thresholds = config.resources.thresholds_for(kind);
        println!(
            "   {kind}: warning {}% / critical {}%",
            thresholds.warning_percent, thresholds.critical_percent
        );
    }

    println!("📋 Security:");
    println!("   secure_failure_mode: {}", config.security.secure_failure_mode);
    if !config.security.secure_failure_mode {
        println!("   ⚠️  error messages will be logged without redaction");
    }

    println!("📋 State validation:");
    println!("   check_interval: {:?}", config.validation.check_interval());
}

fn show_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let manager = load(cli)?;
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(())
}

fn list_environments(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("config"));
    println!("📋 Available Environments in {}:", config_dir.display());

    if !config_dir.exists() {
        println!("❌ Configuration directory not found");
        return Err(format!("{} does not exist", config_dir.display()).into());
    }

    let mut environments: Vec<String> = std::fs::read_dir(&config_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_prefix("resilience.")
                .and_then(|rest| rest.strip_suffix(".toml"))
                .map(str::to_string)
        })
        .collect();
    environments.sort();

    if environments.is_empty() {
        println!("   (no environment overlays, base file only)");
    }
    for environment in environments {
        println!("   • {environment}");
    }
    Ok(())
}
