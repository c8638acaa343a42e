//! # Resilience Context
//!
//! Owns every piece of shared resilience state for one service: the circuit
//! breaker, error history, halt flag, component registry and resource governor,
//! plus the handles of the background loops. There are no module-level globals;
//! construct one context per owning service and call [`ResilienceContext::shutdown`]
//! when the service stops.
//!
//! ```rust,no_run
//! use trade_resilience::{ResilienceContext, RpcError};
//! use trade_resilience::config::ResilienceConfig;
//! use trade_resilience::resilience::CallParameters;
//!
//! # async fn example() -> trade_resilience::Result<()> {
//! let context = ResilienceContext::new(ResilienceConfig::default())?;
//! let slot = context
//!     .executor()
//!     .run("get_slot", CallParameters::new(), |_| async { Ok::<_, RpcError>(42u64) })
//!     .await;
//! assert_eq!(slot.ok(), Some(42));
//! context.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::{ConfigManager, ResilienceConfig};
use crate::error::Result;
use crate::health::{
    ComponentHealthRegistry, HealthSnapshot, ResourceGovernor, ResourceSampler, StateValidator,
};
use crate::resilience::{
    CallParameters, CircuitBreaker, ClassifiableError, ErrorHistory, ErrorStatistics,
    ExecutionError, RetryExecutor,
};
use crate::security::Sanitizer;
use chrono::Utc;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct ResilienceContext {
    config: ResilienceConfig,
    sanitizer: Sanitizer,
    breaker: Arc<CircuitBreaker>,
    history: Arc<ErrorHistory>,
    executor: RetryExecutor,
    registry: Arc<ComponentHealthRegistry>,
    governor: Arc<ResourceGovernor>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for ResilienceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceContext")
            .field("breaker", &self.breaker)
            .field("registry", &self.registry)
            .field("background_tasks", &self.tasks.lock().len())
            .finish_non_exhaustive()
    }
}

impl ResilienceContext {
    /// Build a context from validated configuration
    pub fn new(config: ResilienceConfig) -> Result<Self> {
        config.validate()?;

        let sanitizer = Sanitizer::new(config.security.secure_failure_mode);
        let breaker = Arc::new(CircuitBreaker::new("rpc", &config.circuit_breaker));
        let history = Arc::new(ErrorHistory::new());
        let executor = RetryExecutor::from_parts(
            &config,
            breaker.clone(),
            history.clone(),
            Arc::new(AtomicBool::new(false)),
        );
        let registry = Arc::new(ComponentHealthRegistry::new(&config.resources, sanitizer));
        let governor = Arc::new(ResourceGovernor::new(registry.clone()));
        let (shutdown_tx, _) = watch::channel(false);

        info!(
            max_retries = config.retry.max_retries,
            failure_threshold = config.circuit_breaker.failure_threshold,
            secure_failure_mode = sanitizer.is_enabled(),
            "Resilience context initialized"
        );

        Ok(Self {
            config,
            sanitizer,
            breaker,
            history,
            executor,
            registry,
            governor,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn from_config_manager(manager: &ConfigManager) -> Result<Self> {
        Self::new(manager.config().clone())
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn sanitizer(&self) -> Sanitizer {
        self.sanitizer
    }

    /// Retry executor sharing this context's breaker, history and halt flag
    pub fn executor(&self) -> RetryExecutor {
        self.executor.clone()
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn registry(&self) -> &Arc<ComponentHealthRegistry> {
        &self.registry
    }

    pub fn governor(&self) -> &Arc<ResourceGovernor> {
        &self.governor
    }

    /// True once a breaker activation or a halting failure was observed
    pub fn should_stop_trading(&self) -> bool {
        self.executor.should_stop_trading() || self.breaker.is_active()
    }

    pub fn resume_trading(&self) {
        self.executor.resume_trading();
    }

    /// Run an operation on behalf of a registered component
    ///
    /// A terminal failure is reported to the registry (as critical when it halts
    /// trading or escalates) before the original error is returned.
    pub async fn run_for_component<T, E, F, Fut>(
        &self,
        component: &str,
        operation_name: &str,
        params: CallParameters,
        operation: F,
    ) -> std::result::Result<T, ExecutionError<E>>
    where
        F: FnMut(CallParameters) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: ClassifiableError,
    {
        let result = self.executor.run(operation_name, params, operation).await;

        if let Err(ExecutionError::Failed { error, action, .. }) = &result {
            let is_critical = action.stop_trading || action.escalate;
            if let Err(report_error) = self
                .registry
                .report_failure(component, &error.to_string(), is_critical)
                .await
            {
                warn!(
                    component = %component,
                    error = %report_error,
                    "Could not report component failure"
                );
            }
        }
        result
    }

    pub fn statistics(&self) -> ErrorStatistics {
        ErrorStatistics {
            errors: self.history.summary(&self.sanitizer),
            circuit_breaker: self.breaker.metrics(),
            trading_halted: self.should_stop_trading(),
            generated_at: Utc::now(),
        }
    }

    pub async fn health_snapshot(&self) -> HealthSnapshot {
        self.registry.get_health_snapshot().await
    }

    /// Poll `sampler` at the configured interval and feed the governor
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_resource_monitor<S: ResourceSampler>(&self, sampler: S) {
        let governor = self.governor.clone();
        let sampler = Arc::new(Mutex::new(sampler));
        let interval = self.config.resources.poll_interval();
        let mut shutdown = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = polling_interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let actions = governor.poll_once(&sampler).await;
                        if !actions.is_empty() {
                            debug!(?actions, "Resource governor acted");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            info!("Resource monitor loop shutting down");
        });

        info!(poll_interval_seconds = interval.as_secs(), "Resource monitor started");
        self.tasks.lock().push(handle);
    }

    /// Query `validator` at the configured interval and feed the consistency flag
    ///
    /// A failed check counts as inconsistent. Must be called from within a tokio runtime.
    pub fn start_state_validator(&self, validator: Arc<dyn StateValidator>) {
        let registry = self.registry.clone();
        let interval = self.config.validation.check_interval();
        let mut shutdown = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = polling_interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let consistent = match validator.validate_state().await {
                            Ok(consistent) => consistent,
                            Err(check_error) => {
                                warn!(error = %check_error, "Blockchain state check failed");
                                false
                            }
                        };
                        registry.set_state_consistency(consistent).await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
            info!("State validator loop shutting down");
        });

        info!(check_interval_seconds = interval.as_secs(), "State validator started");
        self.tasks.lock().push(handle);
    }

    /// Stop background loops, cancel the breaker timer and wait for the loops to exit
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        self.breaker.shutdown();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let count = tasks.len();
        for result in futures::future::join_all(tasks).await {
            if let Err(join_error) = result {
                warn!(error = %join_error, "Background task ended abnormally");
            }
        }
        info!(background_tasks = count, "Resilience context shut down");
    }
}

impl Drop for ResilienceContext {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

fn polling_interval(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
