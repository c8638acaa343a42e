//! Configuration layering: base file, environment overlay, process environment.

use std::fs;
use tempfile::TempDir;
use trade_resilience::config::{ConfigManager, ConfigurationError};
use trade_resilience::{ResilienceContext, ResourceKind};

const BASE: &str = r#"
[retry]
max_retries = 4
base_delay_seconds = 0.5

[circuit_breaker]
failure_threshold = 3
cooldown_seconds = 120

[resources]
cpu = { warning_percent = 60.0, critical_percent = 85.0 }
"#;

#[test]
fn test_layers_and_env_overrides() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("resilience.toml"), BASE).unwrap();
    fs::write(
        dir.path().join("resilience.staging.toml"),
        "[circuit_breaker]\ncooldown_seconds = 30\n",
    )
    .unwrap();

    std::env::set_var("RESILIENCE__RETRY__MAX_RETRIES", "7");
    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging");
    std::env::remove_var("RESILIENCE__RETRY__MAX_RETRIES");

    let manager = manager.unwrap();
    let config = manager.config();
    assert_eq!(config.retry.max_retries, 7);
    assert_eq!(config.retry.base_delay_seconds, 0.5);
    assert_eq!(config.circuit_breaker.failure_threshold, 3);
    assert_eq!(config.circuit_breaker.cooldown_seconds, 30);
    assert_eq!(config.resources.thresholds_for(ResourceKind::Cpu).critical_percent, 85.0);
    // Untouched sections keep their defaults
    assert_eq!(config.resources.thresholds_for(ResourceKind::Disk).warning_percent, 85.0);
    assert!(config.security.secure_failure_mode);

    let context = ResilienceContext::from_config_manager(&manager).unwrap();
    assert_eq!(context.config().retry.max_retries, 7);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("resilience.toml"),
        "[resources]\nmemory = { warning_percent = 99.0, critical_percent = 90.0 }\n",
    )
    .unwrap();

    let result = ConfigManager::load_files_only(Some(dir.path().to_path_buf()), "test");
    assert!(matches!(
        result,
        Err(ConfigurationError::InvalidValue { .. })
    ));
}

#[test]
fn test_malformed_toml_reports_sources() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("resilience.toml"), "[retry\nmax_retries = ").unwrap();

    let result = ConfigManager::load_files_only(Some(dir.path().to_path_buf()), "test");
    match result {
        Err(ConfigurationError::LoadError { sources, .. }) => assert_eq!(sources.len(), 2),
        other => panic!("expected load error, got {other:?}"),
    }
}

#[test]
fn test_shipped_config_files_are_valid() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
    for environment in ["development", "test", "production"] {
        let manager = ConfigManager::load_files_only(Some(dir.clone()), environment)
            .unwrap_or_else(|e| panic!("{environment}: {e}"));
        assert_eq!(manager.environment(), environment);
    }
}
