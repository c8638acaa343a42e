//! # Resilience Module
//!
//! Error classification, recovery decisions and the retry loop for RPC-backed
//! trading operations.
//!
//! ## Architecture
//!
//! - **Classification**: a failed call becomes an [`ErrorContext`] with exactly one
//!   category and severity
//! - **Recovery policy**: a pure decision on retry, delay, parameter adjustment,
//!   escalation and halting
//! - **Circuit breaker**: process-wide fail-fast gate with a timer-driven cooldown
//! - **Retry executor**: the loop tying the above together, recording every failure
//!   in a bounded [`ErrorHistory`]
//! - **Context**: [`ResilienceContext`] owns the shared state and background loops
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trade_resilience::config::ResilienceConfig;
//! use trade_resilience::resilience::{CallParameters, ResilienceContext};
//! use trade_resilience::RpcError;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ResilienceContext::new(ResilienceConfig::default())?;
//! let executor = context.executor();
//!
//! let balance = executor
//!     .run("get_balance", CallParameters::new(), |_params| async {
//!         Err::<u64, _>(RpcError::Connection("connection refused".to_string()))
//!     })
//!     .await;
//!
//! if let Err(failure) = balance {
//!     if failure.stops_trading() {
//!         // halt the trading loop
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod context;
pub mod error_classifier;
pub mod error_history;
pub mod recovery_policy;
pub mod retry_executor;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics};
pub use context::ResilienceContext;
pub use error_classifier::{
    ClassifiableError, ErrorCategory, ErrorClassifier, ErrorContext, ErrorSeverity, FailureKind,
    StandardErrorClassifier,
};
pub use error_history::{ErrorHistory, ErrorStatistics, ErrorSummary, RecentError};
pub use recovery_policy::{CallParameters, RecoveryAction, RecoveryPolicy};
pub use retry_executor::{ExecutionError, RetryExecutor};
