//! # Resilience Configuration
//!
//! Plain numeric/boolean settings consumed by the resilience core. Values come from
//! TOML files plus environment overrides (see [`ConfigManager`]); every section has
//! defaults so an empty file is a valid configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trade_resilience::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let retry = &manager.config().retry;
//! println!("max retries: {}", retry.max_retries);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::health::ResourceKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration for a [`crate::ResilienceContext`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub resources: ResourceThresholdsConfig,
    pub security: SecurityConfig,
    pub validation: StateValidationConfig,
}

impl ResilienceConfig {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.resources.validate()?;
        self.validation.validate()?;
        Ok(())
    }
}

/// Retry loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts made by the retry executor, including the first
    pub max_retries: u32,
    pub base_delay_seconds: f64,
    /// Ceiling for base-delay-derived backoff (rate limiting has its own ceiling)
    pub max_delay_seconds: f64,
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay_seconds)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_delay_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_retries",
                "0",
                "must be greater than 0",
            ));
        }
        if !self.base_delay_seconds.is_finite() || self.base_delay_seconds < 0.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.base_delay_seconds",
                self.base_delay_seconds.to_string(),
                "must be a non-negative number",
            ));
        }
        if !self.max_delay_seconds.is_finite() || self.max_delay_seconds < self.base_delay_seconds
        {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_seconds",
                self.max_delay_seconds.to_string(),
                "must be at least base_delay_seconds",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                self.backoff_multiplier.to_string(),
                "must be >= 1.0",
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_seconds: 1.0,
            max_delay_seconds: 60.0,
            backoff_multiplier: 2.0,
        }
    }
}

/// Process-wide circuit breaker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that activate the breaker
    pub failure_threshold: u32,
    /// Time the breaker stays active before the automatic reset
    pub cooldown_seconds: u64,
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.failure_threshold",
                "0",
                "must be greater than 0",
            ));
        }
        if self.cooldown_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.cooldown_seconds",
                "0",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_seconds: 300,
        }
    }
}

/// Warning/critical usage percentages for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning_percent: f64,
    pub critical_percent: f64,
}

impl ThresholdPair {
    pub const fn new(warning_percent: f64, critical_percent: f64) -> Self {
        Self {
            warning_percent,
            critical_percent,
        }
    }

    fn validate(&self, field: &str) -> ConfigResult<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.warning_percent) || !in_range(self.critical_percent) {
            return Err(ConfigurationError::invalid_value(
                field,
                format!("{}/{}", self.warning_percent, self.critical_percent),
                "thresholds must be percentages between 0 and 100",
            ));
        }
        if self.warning_percent >= self.critical_percent {
            return Err(ConfigurationError::invalid_value(
                field,
                format!("{}/{}", self.warning_percent, self.critical_percent),
                "warning threshold must be below critical threshold",
            ));
        }
        Ok(())
    }
}

/// Per-resource thresholds and the monitor poll interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceThresholdsConfig {
    pub poll_interval_seconds: u64,
    pub cpu: ThresholdPair,
    pub memory: ThresholdPair,
    pub disk: ThresholdPair,
    pub network: ThresholdPair,
}

impl ResourceThresholdsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn thresholds_for(&self, kind: ResourceKind) -> ThresholdPair {
        match kind {
            ResourceKind::Cpu => self.cpu,
            ResourceKind::Memory => self.memory,
            ResourceKind::Disk => self.disk,
            ResourceKind::Network => self.network,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "resources.poll_interval_seconds",
                "0",
                "must be greater than 0",
            ));
        }
        self.cpu.validate("resources.cpu")?;
        self.memory.validate("resources.memory")?;
        self.disk.validate("resources.disk")?;
        self.network.validate("resources.network")?;
        Ok(())
    }
}

impl Default for ResourceThresholdsConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
            cpu: ThresholdPair::new(70.0, 90.0),
            memory: ThresholdPair::new(80.0, 95.0),
            disk: ThresholdPair::new(85.0, 95.0),
            network: ThresholdPair::new(80.0, 95.0),
        }
    }
}

/// Settings for the log/escalation security boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Redact secrets from error messages and diagnostic maps before logging
    pub secure_failure_mode: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secure_failure_mode: true,
        }
    }
}

/// Settings for the external state-consistency validator loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateValidationConfig {
    pub check_interval_seconds: u64,
}

impl StateValidationConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.check_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "validation.check_interval_seconds",
                "0",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for StateValidationConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 60,
        }
    }
}
