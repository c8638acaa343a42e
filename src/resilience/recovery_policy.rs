//! # Recovery Policy
//!
//! Decides what to do about a classified failure: retry or not, how long to wait,
//! whether the next attempt should run with adjusted parameters, and whether the
//! failure warrants escalation or a halt of all trading.
//!
//! The circuit breaker override is checked first; otherwise the decision depends
//! only on the category (and, for the catch-all categories, the severity).

use crate::constants::{adjustments, recovery};
use crate::resilience::{ErrorCategory, ErrorContext, ErrorSeverity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Keyword arguments of a retried call
pub type CallParameters = HashMap<String, serde_json::Value>;

/// Outcome of a recovery decision. Computed, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub should_retry: bool,
    pub delay: Duration,
    /// Present iff the next attempt should run with adjusted parameters
    pub parameter_adjustments: Option<CallParameters>,
    pub escalate: bool,
    /// Halt the calling subsystem, not just this operation
    pub stop_trading: bool,
}

impl RecoveryAction {
    fn retry_after(delay: Duration) -> Self {
        Self {
            should_retry: true,
            delay,
            parameter_adjustments: None,
            escalate: false,
            stop_trading: false,
        }
    }

    fn give_up() -> Self {
        Self {
            should_retry: false,
            delay: Duration::ZERO,
            parameter_adjustments: None,
            escalate: false,
            stop_trading: false,
        }
    }

    fn halt() -> Self {
        Self {
            stop_trading: true,
            ..Self::give_up()
        }
    }

    fn with_adjustment(mut self, key: &str, factor: f64) -> Self {
        self.parameter_adjustments = Some(HashMap::from([(
            key.to_string(),
            serde_json::json!(factor),
        )]));
        self
    }

    pub fn adjusts_parameters(&self) -> bool {
        self.parameter_adjustments.is_some()
    }
}

/// Category-driven recovery rules
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    max_delay: Duration,
}

impl RecoveryPolicy {
    /// `max_delay` caps the base-delay-derived backoffs
    pub fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }

    pub fn decide(&self, error: &ErrorContext, circuit_breaker_active: bool) -> RecoveryAction {
        if circuit_breaker_active {
            return RecoveryAction::halt();
        }

        let attempt = error.retry_count;
        let base = error.base_delay.as_secs_f64();
        let ceiling = Some(self.max_delay.as_secs_f64());

        match error.category {
            ErrorCategory::RpcConnection => RecoveryAction::retry_after(backoff(
                base,
                error.backoff_multiplier,
                attempt,
                ceiling,
            )),
            ErrorCategory::RpcTimeout => RecoveryAction::retry_after(backoff(
                base,
                recovery::TIMEOUT_BACKOFF_FACTOR,
                attempt,
                ceiling,
            )),
            ErrorCategory::RpcRateLimit => RecoveryAction::retry_after(backoff(
                recovery::RATE_LIMIT_BASE_DELAY_SECS,
                2.0,
                attempt,
                Some(recovery::RATE_LIMIT_MAX_DELAY_SECS),
            )),
            ErrorCategory::NetworkCongestion => RecoveryAction::retry_after(backoff(
                recovery::CONGESTION_BASE_DELAY_SECS,
                recovery::CONGESTION_BACKOFF_FACTOR,
                attempt,
                None,
            ))
            .with_adjustment(
                adjustments::PRIORITY_FEE_MULTIPLIER,
                adjustments::PRIORITY_FEE_FACTOR,
            ),
            ErrorCategory::InsufficientBalance => RecoveryAction::halt(),
            ErrorCategory::PoolLiquidity => RecoveryAction::give_up(),
            ErrorCategory::SlippageExceeded => {
                if !slippage_already_widened(error) {
                    RecoveryAction::retry_after(Duration::from_secs_f64(
                        recovery::SLIPPAGE_RETRY_DELAY_SECS,
                    ))
                    .with_adjustment(
                        adjustments::SLIPPAGE_TOLERANCE_MULTIPLIER,
                        adjustments::SLIPPAGE_TOLERANCE_FACTOR,
                    )
                } else {
                    RecoveryAction::give_up()
                }
            }
            ErrorCategory::Unknown
            | ErrorCategory::ExternalSdk
            | ErrorCategory::TransactionFailed => {
                if error.severity == ErrorSeverity::Critical {
                    RecoveryAction {
                        escalate: true,
                        ..RecoveryAction::give_up()
                    }
                } else {
                    RecoveryAction::retry_after(backoff(
                        base,
                        error.backoff_multiplier,
                        attempt,
                        ceiling,
                    ))
                }
            }
        }
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// The attempt that failed already ran with the widened slippage tolerance
fn slippage_already_widened(error: &ErrorContext) -> bool {
    error
        .additional_data
        .as_ref()
        .is_some_and(|data| data.contains_key(adjustments::SLIPPAGE_TOLERANCE_MULTIPLIER))
}

/// `base_secs * factor^attempt`, optionally capped, saturating instead of panicking
fn backoff(base_secs: f64, factor: f64, attempt: u32, ceiling_secs: Option<f64>) -> Duration {
    if base_secs <= 0.0 {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let mut secs = base_secs * factor.powi(exponent);
    if let Some(ceiling) = ceiling_secs {
        secs = secs.min(ceiling);
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{ErrorClassifier, StandardErrorClassifier};
    use crate::RpcError;

    fn context_for(error: RpcError, retry_count: u32) -> ErrorContext {
        StandardErrorClassifier::default()
            .classify(&error, "swap", None)
            .with_retry_count(retry_count)
    }

    fn context_with_category(category: ErrorCategory) -> ErrorContext {
        let mut context = context_for(RpcError::Other("x".into()), 0);
        context.category = category;
        context
    }

    #[test]
    fn test_connection_backoff_doubles() {
        let policy = RecoveryPolicy::default();
        let delays: Vec<Duration> = (0..3)
            .map(|n| {
                policy
                    .decide(&context_for(RpcError::Connection("refused".into()), n), false)
                    .delay
            })
            .collect();
        assert_eq!(
            delays,
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_timeout_backoff() {
        let policy = RecoveryPolicy::default();
        let action = policy.decide(&context_for(RpcError::Timeout("slow".into()), 2), false);
        assert!(action.should_retry);
        assert_eq!(action.delay, Duration::from_secs_f64(2.25));
    }

    #[test]
    fn test_base_delay_backoff_is_capped() {
        let policy = RecoveryPolicy::new(Duration::from_secs(10));
        let action = policy.decide(&context_for(RpcError::Connection("refused".into()), 20), false);
        assert_eq!(action.delay, Duration::from_secs(10));
    }

    #[test]
    fn test_rate_limit_ceiling() {
        let policy = RecoveryPolicy::default();
        let first = policy.decide(&context_for(RpcError::Other("rate limit".into()), 0), false);
        assert_eq!(first.delay, Duration::from_secs(30));
        let third = policy.decide(&context_for(RpcError::Other("rate limit".into()), 2), false);
        assert_eq!(third.delay, Duration::from_secs(120));
        let late = policy.decide(&context_for(RpcError::Other("rate limit".into()), 10), false);
        assert_eq!(late.delay, Duration::from_secs(300));
    }

    #[test]
    fn test_congestion_raises_priority_fee() {
        let policy = RecoveryPolicy::default();
        let action = policy.decide(
            &context_for(RpcError::Other("network congestion".into()), 1),
            false,
        );
        assert!(action.should_retry);
        assert_eq!(action.delay, Duration::from_secs(15));
        let params = action.parameter_adjustments.unwrap();
        assert_eq!(
            params.get(adjustments::PRIORITY_FEE_MULTIPLIER),
            Some(&serde_json::json!(1.5))
        );
    }

    #[test]
    fn test_insufficient_balance_halts() {
        let action = RecoveryPolicy::default().decide(
            &context_with_category(ErrorCategory::InsufficientBalance),
            false,
        );
        assert!(!action.should_retry);
        assert!(action.stop_trading);
    }

    #[test]
    fn test_pool_liquidity_skips_without_halting() {
        let action = RecoveryPolicy::default()
            .decide(&context_with_category(ErrorCategory::PoolLiquidity), false);
        assert!(!action.should_retry);
        assert!(!action.stop_trading);
    }

    #[test]
    fn test_slippage_retries_once() {
        let policy = RecoveryPolicy::default();
        let first = policy.decide(&context_for(RpcError::Other("slippage".into()), 0), false);
        assert!(first.should_retry);
        assert_eq!(first.delay, Duration::from_secs(5));
        assert!(first.adjusts_parameters());

        let widened = StandardErrorClassifier::default()
            .classify(
                &RpcError::Other("slippage".into()),
                "swap",
                first.parameter_adjustments.clone(),
            )
            .with_retry_count(1);
        let second = policy.decide(&widened, false);
        assert!(!second.should_retry);
    }

    #[test]
    fn test_slippage_after_other_failures_still_retries() {
        let policy = RecoveryPolicy::default();
        let mut params = CallParameters::new();
        params.insert("amount_in".to_string(), serde_json::json!(500));
        let context = StandardErrorClassifier::default()
            .classify(&RpcError::Sdk("slippage tolerance exceeded".into()), "swap", Some(params))
            .with_retry_count(2);

        let action = policy.decide(&context, false);
        assert!(action.should_retry);
        assert_eq!(
            action.parameter_adjustments.unwrap()[adjustments::SLIPPAGE_TOLERANCE_MULTIPLIER],
            serde_json::json!(adjustments::SLIPPAGE_TOLERANCE_FACTOR)
        );
    }

    #[test]
    fn test_critical_unknown_escalates() {
        let action = RecoveryPolicy::default()
            .decide(&context_for(RpcError::Other("fatal corruption".into()), 0), false);
        assert!(!action.should_retry);
        assert!(action.escalate);

        let action = RecoveryPolicy::default()
            .decide(&context_for(RpcError::Sdk("decode failure".into()), 1), false);
        assert!(action.should_retry);
        assert!(!action.escalate);
        assert_eq!(action.delay, Duration::from_secs(2));
    }

    #[test]
    fn test_circuit_breaker_overrides_every_category() {
        let policy = RecoveryPolicy::default();
        for category in ErrorCategory::ALL {
            let action = policy.decide(&context_with_category(category), true);
            assert!(!action.should_retry, "{category}");
            assert!(action.stop_trading, "{category}");
        }
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(backoff(10.0, 1.5, u32::MAX, None), Duration::MAX);
    }
}
