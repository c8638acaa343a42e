//! # RPC Error Classification
//!
//! Maps a failed call (error value, operation name, optional diagnostic data) to an
//! [`ErrorContext`] carrying exactly one [`ErrorCategory`] and one [`ErrorSeverity`].
//!
//! ## Classification order
//!
//! ```text
//! ┌───────────────┐   ┌──────────────────┐   ┌──────────────────┐   ┌─────────┐
//! │ FailureKind   │──▶│ message keywords │──▶│ FailureKind      │──▶│ UNKNOWN │
//! │ Connection/   │   │ rate limit,      │   │ Sdk/Transaction  │   │ MEDIUM  │
//! │ Timeout       │   │ balance, ...     │   │                  │   │         │
//! └───────────────┘   └──────────────────┘   └──────────────────┘   └─────────┘
//! ```
//!
//! The first matching rule wins, so a message containing both "network" and
//! "rate limit" is classified as rate limiting.
//!
//! ## Usage
//!
//! ```rust
//! use trade_resilience::resilience::{
//!     ErrorCategory, ErrorClassifier, ErrorSeverity, StandardErrorClassifier,
//! };
//! use trade_resilience::RpcError;
//!
//! let classifier = StandardErrorClassifier::default();
//! let error = RpcError::Connection("connection refused".to_string());
//! let context = classifier.classify(&error, "get_balance", None);
//!
//! assert_eq!(context.category, ErrorCategory::RpcConnection);
//! assert_eq!(context.severity, ErrorSeverity::Medium);
//! ```

use crate::config::RetryConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Closed taxonomy of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    RpcConnection,
    RpcTimeout,
    RpcRateLimit,
    TransactionFailed,
    InsufficientBalance,
    NetworkCongestion,
    ExternalSdk,
    PoolLiquidity,
    SlippageExceeded,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 10] = [
        ErrorCategory::RpcConnection,
        ErrorCategory::RpcTimeout,
        ErrorCategory::RpcRateLimit,
        ErrorCategory::TransactionFailed,
        ErrorCategory::InsufficientBalance,
        ErrorCategory::NetworkCongestion,
        ErrorCategory::ExternalSdk,
        ErrorCategory::PoolLiquidity,
        ErrorCategory::SlippageExceeded,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::RpcConnection => "RPC_CONNECTION",
            ErrorCategory::RpcTimeout => "RPC_TIMEOUT",
            ErrorCategory::RpcRateLimit => "RPC_RATE_LIMIT",
            ErrorCategory::TransactionFailed => "TRANSACTION_FAILED",
            ErrorCategory::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorCategory::NetworkCongestion => "NETWORK_CONGESTION",
            ErrorCategory::ExternalSdk => "EXTERNAL_SDK",
            ErrorCategory::PoolLiquidity => "POOL_LIQUIDITY",
            ErrorCategory::SlippageExceeded => "SLIPPAGE_EXCEEDED",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious a failure is; drives backoff and escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Structural kind of an error, independent of its message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    Timeout,
    /// Raised by an external SDK (DEX client, wallet library, ...)
    Sdk,
    /// A submitted transaction was rejected or reverted
    Transaction,
    Other,
}

/// Errors the classifier can inspect
///
/// The default `failure_kind` is [`FailureKind::Other`], which leaves
/// classification to the message heuristics.
pub trait ClassifiableError: std::error::Error {
    fn failure_kind(&self) -> FailureKind {
        FailureKind::Other
    }

    /// Short type-like name recorded on the [`ErrorContext`]
    fn kind_name(&self) -> String {
        format!("{:?}", self.failure_kind())
    }
}

impl ClassifiableError for std::io::Error {
    fn failure_kind(&self) -> FailureKind {
        use std::io::ErrorKind;
        match self.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable
            | ErrorKind::BrokenPipe => FailureKind::Connection,
            ErrorKind::TimedOut => FailureKind::Timeout,
            _ => FailureKind::Other,
        }
    }

    fn kind_name(&self) -> String {
        format!("io::{:?}", self.kind())
    }
}

impl ClassifiableError for tokio::time::error::Elapsed {
    fn failure_kind(&self) -> FailureKind {
        FailureKind::Timeout
    }

    fn kind_name(&self) -> String {
        "Elapsed".to_string()
    }
}

/// Immutable record of one classified failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub error_id: Uuid,
    pub error_kind: String,
    pub message: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub timestamp: DateTime<Utc>,
    /// Free-text label of the failing call site
    pub operation: String,
    /// 0-based index of the attempt that failed
    pub retry_count: u32,
    pub max_retries: u32,
    pub backoff_multiplier: f64,
    pub base_delay: Duration,
    pub additional_data: Option<HashMap<String, serde_json::Value>>,
}

impl ErrorContext {
    /// Copy of this context attributed to a different attempt
    pub fn with_retry_count(&self, retry_count: u32) -> Self {
        Self {
            retry_count,
            ..self.clone()
        }
    }

    pub fn is_final_attempt(&self) -> bool {
        self.retry_count + 1 >= self.max_retries
    }
}

/// Trait for error classification strategies
pub trait ErrorClassifier: Send + Sync {
    fn classify<E: ClassifiableError + ?Sized>(
        &self,
        error: &E,
        operation: &str,
        context_data: Option<HashMap<String, serde_json::Value>>,
    ) -> ErrorContext;
}

/// Keyword-driven classifier for RPC and DEX failures
#[derive(Debug, Clone)]
pub struct StandardErrorClassifier {
    max_retries: u32,
    base_delay: Duration,
    backoff_multiplier: f64,
}

impl StandardErrorClassifier {
    pub fn new(retry: &RetryConfig) -> Self {
        Self {
            max_retries: retry.max_retries,
            base_delay: retry.base_delay(),
            backoff_multiplier: retry.backoff_multiplier,
        }
    }

    /// Category and severity for a kind and message. Pure and total.
    pub fn categorize(kind: FailureKind, message: &str) -> (ErrorCategory, ErrorSeverity) {
        match kind {
            FailureKind::Connection => {
                return (ErrorCategory::RpcConnection, ErrorSeverity::Medium)
            }
            FailureKind::Timeout => return (ErrorCategory::RpcTimeout, ErrorSeverity::Medium),
            _ => {}
        }

        let lower = message.to_lowercase();
        let category = if lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("429")
        {
            ErrorCategory::RpcRateLimit
        } else if lower.contains("insufficient") && lower.contains("balance") {
            ErrorCategory::InsufficientBalance
        } else if lower.contains("liquidity") {
            ErrorCategory::PoolLiquidity
        } else if lower.contains("slippage") {
            ErrorCategory::SlippageExceeded
        } else if lower.contains("network") || lower.contains("congestion") {
            ErrorCategory::NetworkCongestion
        } else {
            match kind {
                FailureKind::Sdk => ErrorCategory::ExternalSdk,
                FailureKind::Transaction => ErrorCategory::TransactionFailed,
                _ => ErrorCategory::Unknown,
            }
        };

        (category, Self::severity_for(category, &lower))
    }

    fn severity_for(category: ErrorCategory, lower_message: &str) -> ErrorSeverity {
        match category {
            ErrorCategory::RpcRateLimit
            | ErrorCategory::InsufficientBalance
            | ErrorCategory::NetworkCongestion => ErrorSeverity::High,
            ErrorCategory::RpcConnection
            | ErrorCategory::RpcTimeout
            | ErrorCategory::PoolLiquidity
            | ErrorCategory::SlippageExceeded => ErrorSeverity::Medium,
            ErrorCategory::ExternalSdk
            | ErrorCategory::Unknown
            | ErrorCategory::TransactionFailed => {
                let base = if category == ErrorCategory::TransactionFailed {
                    ErrorSeverity::High
                } else {
                    ErrorSeverity::Medium
                };
                if ["fatal", "critical", "corrupt", "panic"]
                    .iter()
                    .any(|marker| lower_message.contains(marker))
                {
                    ErrorSeverity::Critical
                } else {
                    base
                }
            }
        }
    }
}

impl Default for StandardErrorClassifier {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify<E: ClassifiableError + ?Sized>(
        &self,
        error: &E,
        operation: &str,
        context_data: Option<HashMap<String, serde_json::Value>>,
    ) -> ErrorContext {
        let message = error.to_string();
        let (category, severity) = Self::categorize(error.failure_kind(), &message);

        ErrorContext {
            error_id: Uuid::new_v4(),
            error_kind: error.kind_name(),
            message,
            category,
            severity,
            timestamp: Utc::now(),
            operation: operation.to_string(),
            retry_count: 0,
            max_retries: self.max_retries,
            backoff_multiplier: self.backoff_multiplier,
            base_delay: self.base_delay,
            additional_data: context_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RpcError;

    fn classify(error: &RpcError) -> ErrorContext {
        StandardErrorClassifier::default().classify(error, "test_operation", None)
    }

    #[test]
    fn test_kind_takes_precedence_over_message() {
        let context = classify(&RpcError::Connection("rate limit hit while connecting".into()));
        assert_eq!(context.category, ErrorCategory::RpcConnection);
        assert_eq!(context.severity, ErrorSeverity::Medium);

        let context = classify(&RpcError::Timeout("request timed out".into()));
        assert_eq!(context.category, ErrorCategory::RpcTimeout);
    }

    #[test]
    fn test_message_keywords() {
        let cases = [
            ("429 Too Many Requests", ErrorCategory::RpcRateLimit, ErrorSeverity::High),
            (
                "Insufficient SOL balance for swap",
                ErrorCategory::InsufficientBalance,
                ErrorSeverity::High,
            ),
            ("not enough liquidity in pool", ErrorCategory::PoolLiquidity, ErrorSeverity::Medium),
            ("Slippage tolerance exceeded", ErrorCategory::SlippageExceeded, ErrorSeverity::Medium),
            ("network congestion detected", ErrorCategory::NetworkCongestion, ErrorSeverity::High),
            ("something odd happened", ErrorCategory::Unknown, ErrorSeverity::Medium),
        ];
        for (message, category, severity) in cases {
            let context = classify(&RpcError::Other(message.into()));
            assert_eq!(context.category, category, "message: {message}");
            assert_eq!(context.severity, severity, "message: {message}");
        }
    }

    #[test]
    fn test_sdk_and_transaction_kinds() {
        let context = classify(&RpcError::Sdk("jupiter quote decode error".into()));
        assert_eq!(context.category, ErrorCategory::ExternalSdk);
        assert_eq!(context.severity, ErrorSeverity::Medium);

        let context = classify(&RpcError::Transaction("custom program error 0x1".into()));
        assert_eq!(context.category, ErrorCategory::TransactionFailed);
        assert_eq!(context.severity, ErrorSeverity::High);

        // Message keywords still win over the Sdk kind
        let context = classify(&RpcError::Sdk("slippage exceeded".into()));
        assert_eq!(context.category, ErrorCategory::SlippageExceeded);
    }

    #[test]
    fn test_critical_markers_raise_severity() {
        let context = classify(&RpcError::Other("fatal: account state corrupt".into()));
        assert_eq!(context.category, ErrorCategory::Unknown);
        assert_eq!(context.severity, ErrorSeverity::Critical);

        // Markers do not affect categories with fixed severity
        let context = classify(&RpcError::Other("fatal rate limit".into()));
        assert_eq!(context.severity, ErrorSeverity::High);
    }

    #[test]
    fn test_context_fields() {
        let mut data = HashMap::new();
        data.insert("amount".to_string(), serde_json::json!(1.5));
        let classifier = StandardErrorClassifier::default();
        let context = classifier.classify(
            &RpcError::Connection("connection refused".into()),
            "get_balance",
            Some(data.clone()),
        );

        assert_eq!(context.operation, "get_balance");
        assert_eq!(context.error_kind, "Connection");
        assert_eq!(context.retry_count, 0);
        assert_eq!(context.max_retries, 3);
        assert_eq!(context.base_delay, Duration::from_secs(1));
        assert_eq!(context.additional_data, Some(data));

        let later = context.with_retry_count(2);
        assert_eq!(later.retry_count, 2);
        assert_eq!(later.error_id, context.error_id);
        assert!(later.is_final_attempt());
    }

    #[test]
    fn test_io_errors_map_to_kinds() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(refused.failure_kind(), FailureKind::Connection);
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(timed_out.failure_kind(), FailureKind::Timeout);

        let context = StandardErrorClassifier::default().classify(&timed_out, "send", None);
        assert_eq!(context.category, ErrorCategory::RpcTimeout);
        assert_eq!(context.error_kind, "io::TimedOut");
    }
}
