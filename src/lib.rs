#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Trade Resilience
//!
//! Error classification, retry and graceful-degradation core for RPC-backed
//! trading systems.
//!
//! ## Overview
//!
//! A caller performs a fallible operation (an RPC call, a swap execution). On
//! failure the error is classified into one of ten categories, a recovery policy
//! decides whether and when to retry, and the retry executor drives the loop while
//! consulting a process-wide circuit breaker. Terminal failures can be reported to
//! a component health registry that disables, degrades or restarts components by
//! priority. Independently, a resource governor polls system usage and issues its
//! own degradation actions.
//!
//! All state is in-memory and owned by an explicitly constructed
//! [`ResilienceContext`].
//!
//! ## Module Organization
//!
//! - [`resilience`] - Classification, recovery policy, circuit breaker, retry loop
//! - [`health`] - Component registry and resource governor
//! - [`config`] - Configuration loading and validation
//! - [`security`] - Log sanitization and scoped secrets
//! - [`logging`] - Structured logging setup and escalation channel
//! - [`error`] - Crate error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trade_resilience::config::ConfigManager;
//! use trade_resilience::health::ComponentPriority;
//! use trade_resilience::resilience::CallParameters;
//! use trade_resilience::{ResilienceContext, RpcError};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! trade_resilience::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let context = ResilienceContext::from_config_manager(&manager)?;
//! context.registry().register("swap_executor", ComponentPriority::Critical).await?;
//!
//! let signature = context
//!     .run_for_component("swap_executor", "execute_swap", CallParameters::new(), |params| async move {
//!         let _fee = params.get("priority_fee_multiplier");
//!         Ok::<_, RpcError>("5xSig")
//!     })
//!     .await;
//!
//! println!("{signature:?} halted={}", context.should_stop_trading());
//! context.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod logging;
pub mod resilience;
pub mod security;

pub use config::{ConfigManager, ResilienceConfig};
pub use error::{ResilienceError, Result, RpcError};
pub use health::{ComponentHealthRegistry, ComponentPriority, ResourceGovernor, ResourceKind};
pub use resilience::{
    CallParameters, CircuitBreaker, ErrorCategory, ErrorContext, ErrorSeverity, ExecutionError,
    RecoveryAction, ResilienceContext, RetryExecutor,
};
pub use security::{sanitize, SecretHandle};
