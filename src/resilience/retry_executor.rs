//! # Retry Executor
//!
//! Drives the retry loop around a fallible async operation:
//!
//! 1. Fail fast if the circuit breaker is already active.
//! 2. Run the operation. On success, record it on the breaker and return.
//! 3. On failure, classify, log and record the error, then ask the
//!    [`RecoveryPolicy`] what to do with it.
//! 4. Retry after the policy's delay (with any parameter adjustments merged into
//!    the next call), or give up and hand back the original error.
//!
//! The only suspension point between attempts is the delay sleep. Dropping the
//! future returned by [`RetryExecutor::run`] cancels the loop there; no further
//! attempt is started.

use crate::config::ResilienceConfig;
use crate::logging::{log_classified_failure, log_escalation};
use crate::resilience::{
    CallParameters, CircuitBreaker, ClassifiableError, ErrorClassifier, ErrorContext, ErrorHistory,
    RecoveryAction, RecoveryPolicy, StandardErrorClassifier,
};
use crate::security::Sanitizer;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Terminal outcome of [`RetryExecutor::run`]
#[derive(Debug, Error)]
pub enum ExecutionError<E> {
    /// The breaker was active; the operation was never called
    #[error("Circuit breaker is active, {operation} not attempted")]
    CircuitOpen { operation: String },

    /// The operation failed and will not be retried. `error` is the value the
    /// operation returned on its last attempt, unchanged.
    #[error("{operation} failed after {attempts} attempt(s): {error}")]
    Failed {
        operation: String,
        error: E,
        attempts: u32,
        action: RecoveryAction,
    },
}

impl<E> ExecutionError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ExecutionError::CircuitOpen { .. })
    }

    /// The caller's original error, if the operation ran at all
    pub fn into_source(self) -> Option<E> {
        match self {
            ExecutionError::Failed { error, .. } => Some(error),
            ExecutionError::CircuitOpen { .. } => None,
        }
    }

    pub fn source_error(&self) -> Option<&E> {
        match self {
            ExecutionError::Failed { error, .. } => Some(error),
            ExecutionError::CircuitOpen { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ExecutionError::Failed { attempts, .. } => *attempts,
            ExecutionError::CircuitOpen { .. } => 0,
        }
    }

    /// Whether the failure should halt the calling subsystem
    pub fn stops_trading(&self) -> bool {
        match self {
            ExecutionError::Failed { action, .. } => action.stop_trading,
            ExecutionError::CircuitOpen { .. } => true,
        }
    }
}

/// Retry loop sharing classifier, policy, breaker and history with its context
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    classifier: Arc<StandardErrorClassifier>,
    policy: Arc<RecoveryPolicy>,
    breaker: Arc<CircuitBreaker>,
    history: Arc<ErrorHistory>,
    sanitizer: Sanitizer,
    trading_halted: Arc<AtomicBool>,
    max_retries: u32,
}

impl RetryExecutor {
    /// Standalone executor with its own breaker and history
    pub fn new(config: &ResilienceConfig) -> Self {
        Self::from_parts(
            config,
            Arc::new(CircuitBreaker::new("rpc", &config.circuit_breaker)),
            Arc::new(ErrorHistory::new()),
            Arc::new(AtomicBool::new(false)),
        )
    }

    pub(crate) fn from_parts(
        config: &ResilienceConfig,
        breaker: Arc<CircuitBreaker>,
        history: Arc<ErrorHistory>,
        trading_halted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            classifier: Arc::new(StandardErrorClassifier::new(&config.retry)),
            policy: Arc::new(RecoveryPolicy::new(config.retry.max_delay())),
            breaker,
            history,
            sanitizer: Sanitizer::new(config.security.secure_failure_mode),
            trading_halted,
            max_retries: config.retry.max_retries,
        }
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn history(&self) -> &Arc<ErrorHistory> {
        &self.history
    }

    /// Latched once any decision requested a halt
    pub fn should_stop_trading(&self) -> bool {
        self.trading_halted.load(Ordering::Acquire)
    }

    /// Run `operation` with retries
    ///
    /// `params` are handed to every attempt; parameter adjustments requested by the
    /// policy are merged into them before the next attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation_name: &str,
        mut params: CallParameters,
        mut operation: F,
    ) -> Result<T, ExecutionError<E>>
    where
        F: FnMut(CallParameters) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifiableError,
    {
        if self.breaker.is_active() {
            warn!(
                operation = %operation_name,
                activated_at = ?self.breaker.activated_at(),
                "Circuit breaker active, failing fast"
            );
            return Err(ExecutionError::CircuitOpen {
                operation: operation_name.to_string(),
            });
        }

        let max_attempts = self.max_retries.max(1);
        let mut attempt: u32 = 0;

        loop {
            let failure = match operation(params.clone()).await {
                Ok(value) => {
                    self.breaker.record_success();
                    if attempt > 0 {
                        info!(
                            operation = %operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let diagnostics = (!params.is_empty()).then(|| params.clone());
            let context = self
                .classifier
                .classify(&failure, operation_name, diagnostics)
                .with_retry_count(attempt);
            log_classified_failure(&context, &self.sanitizer);
            self.history.record(context.clone());

            let action = self.policy.decide(&context, self.breaker.is_active());
            if action.stop_trading {
                self.halt_trading(&context);
            }

            let exhausted = attempt + 1 >= max_attempts;
            if !action.should_retry || exhausted {
                self.breaker.record_failure();
                if action.escalate {
                    self.history.record_escalation();
                    log_escalation(&context, &self.sanitizer, "unrecoverable critical failure");
                }
                debug!(
                    operation = %operation_name,
                    attempts = attempt + 1,
                    exhausted,
                    category = %context.category,
                    "Giving up on operation"
                );
                return Err(ExecutionError::Failed {
                    operation: operation_name.to_string(),
                    error: failure,
                    attempts: attempt + 1,
                    action,
                });
            }

            if let Some(adjustments) = &action.parameter_adjustments {
                debug!(operation = %operation_name, ?adjustments, "Adjusting call parameters");
                params.extend(adjustments.clone());
            }

            debug!(
                operation = %operation_name,
                attempt = attempt + 1,
                delay_ms = action.delay.as_millis() as u64,
                "Retrying after delay"
            );
            tokio::time::sleep(action.delay).await;
            attempt += 1;
        }
    }

    fn halt_trading(&self, context: &ErrorContext) {
        if !self.trading_halted.swap(true, Ordering::AcqRel) {
            error!(
                operation = %context.operation,
                category = %context.category,
                circuit_breaker_active = self.breaker.is_active(),
                "Trading halted"
            );
        }
    }

    /// Clear the halt flag after operator intervention
    pub fn resume_trading(&self) {
        if self.trading_halted.swap(false, Ordering::AcqRel) {
            warn!("Trading resumed by operator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RpcError;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn executor(max_retries: u32, threshold: u32) -> RetryExecutor {
        let mut config = ResilienceConfig::default();
        config.retry.max_retries = max_retries;
        config.circuit_breaker.failure_threshold = threshold;
        RetryExecutor::new(&config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_success() {
        let executor = executor(3, 5);
        let calls = AtomicU32::new(0);

        let result: Result<u32, ExecutionError<RpcError>> = executor
            .run("get_slot", CallParameters::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(executor.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff_then_succeeds() {
        let executor = executor(3, 5);
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = executor
            .run("get_balance", CallParameters::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RpcError::Connection("connection refused".into()))
                    } else {
                        Ok("balance")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "balance");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of connection backoff
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(executor.history().len(), 2);
        assert_eq!(executor.circuit_breaker().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_returns_original_error() {
        let executor = executor(3, 5);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .run("swap", CallParameters::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RpcError::Other("insufficient SOL balance".into())) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert!(err.stops_trading());
        assert_eq!(
            err.into_source(),
            Some(RpcError::Other("insufficient SOL balance".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(executor.should_stop_trading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_fast_when_breaker_active() {
        let executor = executor(1, 1);
        let _ = executor
            .run::<(), _, _, _>("swap", CallParameters::new(), |_| async {
                Err(RpcError::Timeout("deadline".into()))
            })
            .await;
        assert!(executor.circuit_breaker().is_active());

        let calls = AtomicU32::new(0);
        let result: Result<(), ExecutionError<RpcError>> = executor
            .run("swap", CallParameters::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_failure_escalates_without_retry() {
        let executor = executor(3, 5);
        let result: Result<(), _> = executor
            .run("sign", CallParameters::new(), |_| async {
                Err(RpcError::Sdk("fatal: keystore corrupt".into()))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 1);
        match err {
            ExecutionError::Failed { action, .. } => assert!(action.escalate),
            other => panic!("unexpected {other:?}"),
        }
        let summary = executor.history().summary(&Sanitizer::new(true));
        assert_eq!(summary.escalations, 1);
    }
}
