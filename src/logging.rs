//! # Structured Logging Module
//!
//! Environment-aware structured logging with a reloadable level filter, so the
//! resource governor can drop verbosity to ERROR-only when disk space runs out.

use crate::resilience::ErrorContext;
use crate::security::Sanitizer;
use chrono::Utc;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Tracing target used for operator-facing escalations
pub const ESCALATION_TARGET: &str = "trade_resilience::escalation";

static LOGGER_INITIALIZED: OnceLock<LoggingHandle> = OnceLock::new();

/// Runtime control over log verbosity
pub trait LogLevelControl: Send + Sync {
    fn set_max_level(&self, level: LevelFilter) -> anyhow::Result<()>;
}

/// Handle to the reloadable filter installed by [`init_structured_logging`]
#[derive(Clone, Debug)]
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelControl for LoggingHandle {
    fn set_max_level(&self, level: LevelFilter) -> anyhow::Result<()> {
        self.filter
            .modify(|filter| *filter = EnvFilter::new(level.to_string()))?;
        Ok(())
    }
}

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once; the first call wins and later calls return the
/// same handle. Set `RESILIENCE_LOG_FORMAT=json` for JSON output.
pub fn init_structured_logging() -> LoggingHandle {
    LOGGER_INITIALIZED
        .get_or_init(|| {
            let environment = get_environment();
            let log_level =
                std::env::var("RUST_LOG").unwrap_or_else(|_| get_log_level(&environment));
            let json = std::env::var("RESILIENCE_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false);

            let (filter, handle) = reload::Layer::new(EnvFilter::new(&log_level));
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with((!json).then(|| fmt::layer().with_target(true).with_level(true)))
                .with(json.then(|| fmt::layer().json().with_target(true)));

            if subscriber.try_init().is_err() {
                tracing::debug!(
                    "Global tracing subscriber already initialized, continuing with existing subscriber"
                );
            }

            tracing::info!(
                pid = std::process::id(),
                environment = %environment,
                log_level = %log_level,
                json = json,
                "Structured logging initialized"
            );

            LoggingHandle { filter: handle }
        })
        .clone()
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("RESILIENCE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a classified failure at a level matching its severity
pub fn log_classified_failure(error: &ErrorContext, sanitizer: &Sanitizer) {
    use crate::resilience::ErrorSeverity;

    let message = sanitizer.text(&error.message);
    match error.severity {
        ErrorSeverity::Low | ErrorSeverity::Medium => tracing::warn!(
            error_id = %error.error_id,
            operation = %error.operation,
            category = %error.category,
            severity = %error.severity,
            retry_count = error.retry_count,
            max_retries = error.max_retries,
            message = %message,
            "Operation failed"
        ),
        ErrorSeverity::High | ErrorSeverity::Critical => tracing::error!(
            error_id = %error.error_id,
            operation = %error.operation,
            category = %error.category,
            severity = %error.severity,
            retry_count = error.retry_count,
            max_retries = error.max_retries,
            message = %message,
            "Operation failed"
        ),
    }
}

/// Emit an escalation line on the dedicated target with sanitized context
pub fn log_escalation(error: &ErrorContext, sanitizer: &Sanitizer, reason: &str) {
    let additional = error
        .additional_data
        .as_ref()
        .map(|data| serde_json::to_string(&sanitizer.map(data)).unwrap_or_default());

    tracing::error!(
        target: ESCALATION_TARGET,
        level_name = "CRITICAL",
        error_id = %error.error_id,
        operation = %error.operation,
        error_kind = %error.error_kind,
        category = %error.category,
        severity = %error.severity,
        retry_count = error.retry_count,
        message = %sanitizer.text(&error.message),
        additional_data = additional.as_deref(),
        reason = reason,
        timestamp = %Utc::now().to_rfc3339(),
        "ESCALATION"
    );
}
