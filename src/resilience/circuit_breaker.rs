//! # Circuit Breaker Implementation
//!
//! Process-wide fail-fast gate. Consecutive failures are counted; once the count
//! reaches the threshold the breaker activates and stays active for a fixed
//! cooldown, after which a timer task resets it.
//!
//! A success resets the consecutive-failure counter but never deactivates an
//! active breaker. Only the cooldown timer, or an explicit operator [`reset`],
//! does that.
//!
//! [`reset`]: CircuitBreaker::reset

use crate::config::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Point-in-time view of the breaker, for statistics snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub active: bool,
    pub consecutive_failures: u64,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub activated_at: Option<DateTime<Utc>>,
    pub total_failures: u64,
    pub total_successes: u64,
    pub activation_count: u64,
}

#[derive(Debug)]
struct BreakerState {
    name: String,
    failure_threshold: u32,
    cooldown: Duration,

    active: AtomicBool,
    consecutive_failures: AtomicU64,
    /// Bumped on every activation and manual reset so a stale timer cannot
    /// clear a newer activation
    generation: AtomicU64,
    activated_at: Mutex<Option<DateTime<Utc>>>,
    reset_task: Mutex<Option<JoinHandle<()>>>,

    total_failures: AtomicU64,
    total_successes: AtomicU64,
    activation_count: AtomicU64,
}

impl BreakerState {
    fn clear(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        *self.activated_at.lock() = None;
        self.active.store(false, Ordering::Release);
    }

    fn reset_after_cooldown(&self, generation: u64) {
        // Held across the check so a concurrent activation cannot install its
        // timer between the check and the take
        let mut reset_task = self.reset_task.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(component = %self.name, "Stale cooldown timer ignored");
            return;
        }
        reset_task.take();
        self.clear();
        drop(reset_task);
        info!(
            component = %self.name,
            cooldown_seconds = self.cooldown.as_secs(),
            "Circuit breaker reset after cooldown"
        );
    }
}

/// Consecutive-failure circuit breaker with timer-driven reset
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Arc<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            cooldown_seconds = config.cooldown_seconds,
            "Circuit breaker initialized"
        );

        Self {
            state: Arc::new(BreakerState {
                name,
                failure_threshold: config.failure_threshold,
                cooldown: config.cooldown(),
                active: AtomicBool::new(false),
                consecutive_failures: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                activated_at: Mutex::new(None),
                reset_task: Mutex::new(None),
                total_failures: AtomicU64::new(0),
                total_successes: AtomicU64::new(0),
                activation_count: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Plain read of the active flag; no side effects
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.state.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        *self.state.activated_at.lock()
    }

    pub fn record_success(&self) {
        self.state.total_successes.fetch_add(1, Ordering::Relaxed);
        self.state.consecutive_failures.store(0, Ordering::Release);
        if self.is_active() {
            debug!(
                component = %self.state.name,
                "Success recorded while breaker active; waiting for cooldown"
            );
        }
    }

    pub fn record_failure(&self) {
        self.state.total_failures.fetch_add(1, Ordering::Relaxed);
        let failures = self.state.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;

        if failures >= u64::from(self.state.failure_threshold)
            && self
                .state
                .active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.activate(failures);
        }
    }

    fn activate(&self, failures: u64) {
        let state = &self.state;
        *state.activated_at.lock() = Some(Utc::now());
        state.activation_count.fetch_add(1, Ordering::Relaxed);
        let generation = state.generation.fetch_add(1, Ordering::AcqRel) + 1;

        error!(
            component = %state.name,
            consecutive_failures = failures,
            failure_threshold = state.failure_threshold,
            cooldown_seconds = state.cooldown.as_secs(),
            "Circuit breaker activated (failing fast)"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak: Weak<BreakerState> = Arc::downgrade(&self.state);
                let cooldown = state.cooldown;
                let task = handle.spawn(async move {
                    tokio::time::sleep(cooldown).await;
                    if let Some(state) = weak.upgrade() {
                        state.reset_after_cooldown(generation);
                    }
                });
                if let Some(previous) = state.reset_task.lock().replace(task) {
                    previous.abort();
                }
            }
            Err(_) => {
                warn!(
                    component = %state.name,
                    "No async runtime available; breaker stays active until reset()"
                );
            }
        }
    }

    /// Operator override: clear the breaker immediately and cancel its timer
    pub fn reset(&self) {
        self.state.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(task) = self.state.reset_task.lock().take() {
            task.abort();
        }
        self.state.clear();
        warn!(component = %self.state.name, "Circuit breaker manually reset");
    }

    /// Cancel the cooldown timer without changing state
    pub fn shutdown(&self) {
        if let Some(task) = self.state.reset_task.lock().take() {
            task.abort();
        }
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = &self.state;
        CircuitBreakerMetrics {
            active: self.is_active(),
            consecutive_failures: self.consecutive_failures(),
            failure_threshold: state.failure_threshold,
            cooldown: state.cooldown,
            activated_at: self.activated_at(),
            total_failures: state.total_failures.load(Ordering::Relaxed),
            total_successes: state.total_successes.load(Ordering::Relaxed),
            activation_count: state.activation_count.load(Ordering::Relaxed),
        }
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
