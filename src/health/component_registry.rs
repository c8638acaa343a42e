//! # Component Health Registry
//!
//! Named components with priority tiers, plus per-resource constraints and the
//! externally fed blockchain-state consistency flag.
//!
//! ## Failure transitions
//!
//! ```text
//! HEALTHY ──failure──▶ LOW              → DISABLED + DEGRADED
//!                      MEDIUM, critical → DEGRADED (stays active)
//!                      MEDIUM           → error recorded, still healthy
//!                      HIGH / CRITICAL  → RESTART ─ok──▶ HEALTHY
//!                                                 └err─▶ DEGRADED
//! ```
//!
//! DISABLED and DEGRADED are terminal until [`ComponentHealthRegistry::reset_component`]:
//! further failures on such a component are counted but trigger no restart.
//!
//! ## Usage
//!
//! ```rust
//! use trade_resilience::config::ResourceThresholdsConfig;
//! use trade_resilience::health::{ComponentHealthRegistry, DegradationOutcome, SystemState};
//! use trade_resilience::security::Sanitizer;
//! use trade_resilience::ComponentPriority;
//!
//! # tokio_test::block_on(async {
//! let registry =
//!     ComponentHealthRegistry::new(&ResourceThresholdsConfig::default(), Sanitizer::new(true));
//! registry.register("ohlcv_collector", ComponentPriority::Low).await.unwrap();
//!
//! let result = registry.report_failure("ohlcv_collector", "HTTP 503", false).await.unwrap();
//! assert_eq!(result.outcome, DegradationOutcome::Disabled);
//! assert_eq!(result.system_state, SystemState::Degraded);
//!
//! let again = registry.report_failure("ohlcv_collector", "HTTP 503", false).await.unwrap();
//! assert_eq!(again.outcome, DegradationOutcome::Recorded);
//!
//! registry.reset_component("ohlcv_collector").await.unwrap();
//! assert_eq!(registry.system_state(), SystemState::Normal);
//! # });
//! ```
//!
//! ## System state
//!
//! - `Critical`: a CRITICAL-priority component is unhealthy, or a resource is at
//!   its critical threshold
//! - `Degraded`: a HIGH-priority component is unhealthy, any component is in
//!   degraded mode, or blockchain state is inconsistent
//! - `Normal` otherwise
//!
//! The state is recomputed after every mutation and transitions are logged.

use crate::config::{ResourceThresholdsConfig, ThresholdPair};
use crate::error::{ResilienceError, Result};
use crate::health::ResourceKind;
use crate::security::Sanitizer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for ComponentPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentPriority::Critical => write!(f, "CRITICAL"),
            ComponentPriority::High => write!(f, "HIGH"),
            ComponentPriority::Medium => write!(f, "MEDIUM"),
            ComponentPriority::Low => write!(f, "LOW"),
        }
    }
}

/// Registry entry for one component. Never removed once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub name: String,
    pub priority: ComponentPriority,
    pub is_active: bool,
    pub is_healthy: bool,
    pub last_health_check: DateTime<Utc>,
    pub error_count: u64,
    pub degraded_mode: bool,
    pub failure_reason: Option<String>,
}

impl ComponentStatus {
    fn new(name: &str, priority: ComponentPriority) -> Self {
        Self {
            name: name.to_string(),
            priority,
            is_active: true,
            is_healthy: true,
            last_health_check: Utc::now(),
            error_count: 0,
            degraded_mode: false,
            failure_reason: None,
        }
    }

    fn mark_degraded(&mut self, reason: String) {
        self.is_healthy = false;
        self.degraded_mode = true;
        self.failure_reason = Some(reason);
    }

    fn mark_disabled(&mut self, reason: String) {
        self.is_active = false;
        self.mark_degraded(reason);
    }
}

/// Brings a failed component back; supplied at registration
#[async_trait]
pub trait RestartHandler: Send + Sync {
    async fn restart(&self, component: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationOutcome {
    Disabled,
    Degraded,
    Restarted,
    RestartFailed,
    /// Failure counted, no state change
    Recorded,
}

/// What [`ComponentHealthRegistry::report_failure`] did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationResult {
    pub component: String,
    pub outcome: DegradationOutcome,
    pub status: ComponentStatus,
    pub system_state: SystemState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    Normal,
    Degraded,
    Critical,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemState::Normal => write!(f, "NORMAL"),
            SystemState::Degraded => write!(f, "DEGRADED"),
            SystemState::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceLevel {
    Normal,
    Warning,
    Critical,
}

/// Thresholds and last observation for one resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConstraint {
    pub resource: ResourceKind,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub current_usage: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ResourceConstraint {
    fn new(resource: ResourceKind, thresholds: ThresholdPair) -> Self {
        Self {
            resource,
            warning_threshold: thresholds.warning_percent,
            critical_threshold: thresholds.critical_percent,
            current_usage: 0.0,
            last_updated: None,
        }
    }

    pub fn level_for(&self, usage_percent: f64) -> ResourceLevel {
        if usage_percent >= self.critical_threshold {
            ResourceLevel::Critical
        } else if usage_percent >= self.warning_threshold {
            ResourceLevel::Warning
        } else {
            ResourceLevel::Normal
        }
    }

    pub fn level(&self) -> ResourceLevel {
        self.level_for(self.current_usage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub state: SystemState,
    pub components: BTreeMap<String, ComponentStatus>,
    pub resources: BTreeMap<ResourceKind, ResourceConstraint>,
    pub blockchain_state_consistent: bool,
    pub generated_at: DateTime<Utc>,
}

struct ComponentEntry {
    status: ComponentStatus,
    restart: Option<Arc<dyn RestartHandler>>,
}

/// Registry of component health with graceful-degradation transitions
pub struct ComponentHealthRegistry {
    components: RwLock<HashMap<String, ComponentEntry>>,
    resources: RwLock<HashMap<ResourceKind, ResourceConstraint>>,
    state_consistent: AtomicBool,
    system_state: Mutex<SystemState>,
    sanitizer: Sanitizer,
}

impl fmt::Debug for ComponentHealthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHealthRegistry")
            .field("system_state", &*self.system_state.lock())
            .field("state_consistent", &self.state_consistent.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ComponentHealthRegistry {
    pub fn new(thresholds: &ResourceThresholdsConfig, sanitizer: Sanitizer) -> Self {
        let resources = ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, ResourceConstraint::new(kind, thresholds.thresholds_for(kind))))
            .collect();

        Self {
            components: RwLock::new(HashMap::new()),
            resources: RwLock::new(resources),
            state_consistent: AtomicBool::new(true),
            system_state: Mutex::new(SystemState::Normal),
            sanitizer,
        }
    }

    pub async fn register(&self, name: &str, priority: ComponentPriority) -> Result<()> {
        self.insert(name, priority, None).await
    }

    pub async fn register_with_restart(
        &self,
        name: &str,
        priority: ComponentPriority,
        handler: Arc<dyn RestartHandler>,
    ) -> Result<()> {
        self.insert(name, priority, Some(handler)).await
    }

    async fn insert(
        &self,
        name: &str,
        priority: ComponentPriority,
        restart: Option<Arc<dyn RestartHandler>>,
    ) -> Result<()> {
        let mut components = self.components.write().await;
        if components.contains_key(name) {
            return Err(ResilienceError::DuplicateComponent(name.to_string()));
        }
        components.insert(
            name.to_string(),
            ComponentEntry {
                status: ComponentStatus::new(name, priority),
                restart,
            },
        );
        drop(components);

        info!(component = %name, priority = %priority, "Component registered");
        self.refresh_system_state().await;
        Ok(())
    }

    /// Apply the priority-specific failure transition to `name`
    pub async fn report_failure(
        &self,
        name: &str,
        error: &str,
        is_critical: bool,
    ) -> Result<DegradationResult> {
        let reason = self.sanitizer.text(error);

        let (priority, restart, already_down) = {
            let mut components = self.components.write().await;
            let entry = components
                .get_mut(name)
                .ok_or_else(|| ResilienceError::ComponentNotFound(name.to_string()))?;
            entry.status.error_count += 1;
            entry.status.last_health_check = Utc::now();
            entry.status.failure_reason = Some(reason.clone());
            let already_down = entry.status.degraded_mode || !entry.status.is_active;
            (entry.status.priority, entry.restart.clone(), already_down)
        };

        warn!(
            component = %name,
            priority = %priority,
            is_critical,
            reason = %reason,
            "Component failure reported"
        );

        let outcome = match priority {
            // Disabled and degraded components only leave that state via reset_component
            _ if already_down => {
                debug!(component = %name, "Component already degraded, failure recorded");
                DegradationOutcome::Recorded
            }
            ComponentPriority::Low => {
                self.update_status(name, |status| status.mark_disabled(reason.clone()))
                    .await?;
                warn!(component = %name, "Low-priority component disabled");
                DegradationOutcome::Disabled
            }
            ComponentPriority::Medium if is_critical => {
                self.update_status(name, |status| status.mark_degraded(reason.clone()))
                    .await?;
                warn!(component = %name, "Component running in degraded mode");
                DegradationOutcome::Degraded
            }
            ComponentPriority::Medium => DegradationOutcome::Recorded,
            ComponentPriority::High | ComponentPriority::Critical => {
                self.update_status(name, |status| status.is_healthy = false).await?;
                self.restart(name, restart).await?
            }
        };

        let system_state = self.refresh_system_state().await;
        let status = self.component_status(name).await?;
        Ok(DegradationResult {
            component: name.to_string(),
            outcome,
            status,
            system_state,
        })
    }

    async fn restart(
        &self,
        name: &str,
        handler: Option<Arc<dyn RestartHandler>>,
    ) -> Result<DegradationOutcome> {
        info!(component = %name, "Attempting component restart");

        let result = match handler {
            Some(handler) => handler.restart(name).await,
            None => {
                debug!(component = %name, "No restart handler registered, treating as restarted");
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                self.update_status(name, |status| {
                    status.is_active = true;
                    status.is_healthy = true;
                    status.degraded_mode = false;
                })
                .await?;
                info!(component = %name, "Component restarted");
                Ok(DegradationOutcome::Restarted)
            }
            Err(restart_error) => {
                let failure = ResilienceError::RestartFailed {
                    component: name.to_string(),
                    reason: self.sanitizer.text(&format!("{restart_error:#}")),
                };
                error!(component = %name, error = %failure, "Component restart failed");
                self.update_status(name, |status| status.mark_degraded(failure.to_string()))
                    .await?;
                Ok(DegradationOutcome::RestartFailed)
            }
        }
    }

    /// Explicit operator reset out of DISABLED or DEGRADED
    pub async fn reset_component(&self, name: &str) -> Result<ComponentStatus> {
        let status = self
            .update_status(name, |status| {
                status.is_active = true;
                status.is_healthy = true;
                status.degraded_mode = false;
                status.failure_reason = None;
            })
            .await?;
        info!(component = %name, "Component reset");
        self.refresh_system_state().await;
        Ok(status)
    }

    /// Disable every active component of `priority`; returns the names disabled
    pub async fn disable_priority(&self, priority: ComponentPriority, reason: &str) -> Vec<String> {
        let disabled: Vec<String> = {
            let mut components = self.components.write().await;
            components
                .values_mut()
                .filter(|entry| entry.status.priority == priority && entry.status.is_active)
                .map(|entry| {
                    entry.status.mark_disabled(reason.to_string());
                    entry.status.last_health_check = Utc::now();
                    entry.status.name.clone()
                })
                .collect()
        };

        if !disabled.is_empty() {
            warn!(
                priority = %priority,
                components = ?disabled,
                reason = %reason,
                "Components disabled pre-emptively"
            );
            self.refresh_system_state().await;
        }
        disabled
    }

    /// Record a usage sample; returns the level it falls in
    pub async fn update_resource(&self, kind: ResourceKind, usage_percent: f64) -> ResourceLevel {
        let level = {
            let mut resources = self.resources.write().await;
            let constraint = resources.entry(kind).or_insert_with(|| {
                ResourceConstraint::new(
                    kind,
                    ResourceThresholdsConfig::default().thresholds_for(kind),
                )
            });
            constraint.current_usage = usage_percent;
            constraint.last_updated = Some(Utc::now());
            constraint.level()
        };
        self.refresh_system_state().await;
        level
    }

    /// Replace the thresholds of one resource kind
    pub async fn set_thresholds(
        &self,
        kind: ResourceKind,
        warning: f64,
        critical: f64,
    ) -> Result<()> {
        if warning.is_nan() || critical.is_nan() || warning >= critical {
            return Err(ResilienceError::InvalidThreshold {
                resource: kind.to_string(),
                warning,
                critical,
            });
        }
        {
            let mut resources = self.resources.write().await;
            let constraint = resources
                .entry(kind)
                .or_insert_with(|| {
                    ResourceConstraint::new(kind, ThresholdPair::new(warning, critical))
                });
            constraint.warning_threshold = warning;
            constraint.critical_threshold = critical;
        }
        self.refresh_system_state().await;
        Ok(())
    }

    pub async fn resource_constraint(&self, kind: ResourceKind) -> Option<ResourceConstraint> {
        self.resources.read().await.get(&kind).cloned()
    }

    /// Feed the result of an external blockchain-state check
    pub async fn set_state_consistency(&self, consistent: bool) {
        let previous = self.state_consistent.swap(consistent, Ordering::AcqRel);
        if previous != consistent {
            if consistent {
                info!("Blockchain state consistent again");
            } else {
                warn!("Blockchain state inconsistency detected");
            }
        }
        self.refresh_system_state().await;
    }

    pub async fn component_status(&self, name: &str) -> Result<ComponentStatus> {
        self.components
            .read()
            .await
            .get(name)
            .map(|entry| entry.status.clone())
            .ok_or_else(|| ResilienceError::ComponentNotFound(name.to_string()))
    }

    pub fn system_state(&self) -> SystemState {
        *self.system_state.lock()
    }

    pub async fn get_health_snapshot(&self) -> HealthSnapshot {
        let components = self
            .components
            .read()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.status.clone()))
            .collect();
        let resources = self
            .resources
            .read()
            .await
            .iter()
            .map(|(kind, constraint)| (*kind, constraint.clone()))
            .collect();

        HealthSnapshot {
            state: self.system_state(),
            components,
            resources,
            blockchain_state_consistent: self.state_consistent.load(Ordering::Acquire),
            generated_at: Utc::now(),
        }
    }

    async fn update_status<F>(&self, name: &str, apply: F) -> Result<ComponentStatus>
    where
        F: FnOnce(&mut ComponentStatus),
    {
        let mut components = self.components.write().await;
        let entry = components
            .get_mut(name)
            .ok_or_else(|| ResilienceError::ComponentNotFound(name.to_string()))?;
        apply(&mut entry.status);
        entry.status.last_health_check = Utc::now();
        Ok(entry.status.clone())
    }

    async fn refresh_system_state(&self) -> SystemState {
        let next = {
            let components = self.components.read().await;
            let resources = self.resources.read().await;
            derive_system_state(
                components.values().map(|entry| &entry.status),
                resources.values(),
                self.state_consistent.load(Ordering::Acquire),
            )
        };

        let mut current = self.system_state.lock();
        if *current != next {
            match next {
                SystemState::Critical => {
                    error!(from = %*current, to = %next, "System state changed")
                }
                SystemState::Degraded => {
                    warn!(from = %*current, to = %next, "System state changed")
                }
                SystemState::Normal => info!(from = %*current, to = %next, "System state changed"),
            }
            *current = next;
        }
        next
    }
}

fn derive_system_state<'a>(
    components: impl Iterator<Item = &'a ComponentStatus> + Clone,
    resources: impl Iterator<Item = &'a ResourceConstraint> + Clone,
    state_consistent: bool,
) -> SystemState {
    let critical_component_down = components
        .clone()
        .any(|c| c.priority == ComponentPriority::Critical && !c.is_healthy);
    let resource_critical = resources.clone().any(|r| r.level() == ResourceLevel::Critical);
    if critical_component_down || resource_critical {
        return SystemState::Critical;
    }

    let degraded = components
        .clone()
        .any(|c| (c.priority == ComponentPriority::High && !c.is_healthy) || c.degraded_mode);
    if degraded || !state_consistent {
        SystemState::Degraded
    } else {
        SystemState::Normal
    }
}
