//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered with the `config`
//! crate, later sources overriding earlier ones:
//!
//! 1. `<config_dir>/resilience.toml`
//! 2. `<config_dir>/resilience.<environment>.toml`
//! 3. `RESILIENCE__<SECTION>__<KEY>` environment variables
//!
//! Missing files are skipped; the defaults in [`ResilienceConfig`] fill any gaps.

use super::error::{ConfigResult, ConfigurationError};
use super::ResilienceConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_NAME: &str = "resilience.toml";
const ENV_PREFIX: &str = "RESILIENCE";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: ResilienceConfig,
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
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, true)
    }

    /// Load files only, ignoring `RESILIENCE__*` process variables
    ///
    /// Useful in tests that must not be affected by the surrounding environment.
    pub fn load_files_only(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, false)
    }

    /// Wrap an already constructed configuration after validating it
    pub fn from_config(config: ResilienceConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: PathBuf::from("config"),
        }))
    }

    fn build(
        config_dir: Option<PathBuf>,
        environment: &str,
        include_process_env: bool,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        let base_path = config_directory.join(BASE_FILE_NAME);
        let env_path = config_directory.join(format!("resilience.{environment}.toml"));

        debug!(
            environment = environment,
            config_directory = %config_directory.display(),
            "Loading resilience configuration"
        );

        let mut builder = Config::builder()
            .add_source(
                File::from(base_path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(env_path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );

        if include_process_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let sources = vec![base_path.clone(), env_path.clone()];
        let config: ResilienceConfig = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|e| ConfigurationError::load_error(sources, e))?;

        config.validate()?;

        info!(
            environment = environment,
            max_retries = config.retry.max_retries,
            failure_threshold = config.circuit_breaker.failure_threshold,
            cooldown_seconds = config.circuit_breaker.cooldown_seconds,
            secure_failure_mode = config.security.secure_failure_mode,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Configuration as JSON with sensitive-looking keys and values masked
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null);
        crate::security::sanitize_json(&mut value);
        value
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("RESILIENCE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        if let Ok(dir) = env::var("RESILIENCE_CONFIG_DIR") {
            return PathBuf::from(dir);
        }
        PathBuf::from("config")
    }
}
