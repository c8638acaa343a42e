//! # Resource Governor
//!
//! Compares resource-usage samples against their thresholds and applies
//! degradation actions:
//!
//! | Resource | Warning        | Critical                          |
//! |----------|----------------|-----------------------------------|
//! | memory   | forced cleanup | disable active LOW components     |
//! | cpu      | log only       | reduced processing frequency flag |
//! | disk     | log only       | log verbosity lowered to ERROR    |
//! | network  | log only       | log only                          |
//!
//! The governor is invoked at a fixed interval by an external loop and holds no
//! timers of its own.

use crate::health::{ComponentHealthRegistry, ComponentPriority, ResourceKind, ResourceLevel};
use crate::logging::LogLevelControl;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sysinfo::{Disks, System};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GovernorAction {
    DisabledLowPriority { components: Vec<String> },
    /// Advisory; consumers read [`ResourceGovernor::processing_throttled`]
    ReducedProcessingFrequency,
    LogLevelLowered,
    ForcedCleanup,
}

/// Cache/buffer release pass run on memory pressure. Runs on the blocking pool.
pub trait CleanupHook: Send + Sync + 'static {
    fn cleanup(&self) -> anyhow::Result<()>;
}

/// Source of resource-usage percentages. May block; always called off the runtime workers.
pub trait ResourceSampler: Send + 'static {
    fn sample(&mut self) -> anyhow::Result<Vec<(ResourceKind, f64)>>;
}

/// External blockchain-state consistency check
#[async_trait]
pub trait StateValidator: Send + Sync + 'static {
    async fn validate_state(&self) -> anyhow::Result<bool>;
}

pub struct ResourceGovernor {
    registry: Arc<ComponentHealthRegistry>,
    log_control: RwLock<Option<Arc<dyn LogLevelControl>>>,
    cleanup: RwLock<Option<Arc<dyn CleanupHook>>>,
    processing_throttled: AtomicBool,
}

impl fmt::Debug for ResourceGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGovernor")
            .field("processing_throttled", &self.processing_throttled())
            .field("has_log_control", &self.log_control.read().is_some())
            .field("has_cleanup_hook", &self.cleanup.read().is_some())
            .finish()
    }
}

impl ResourceGovernor {
    pub fn new(registry: Arc<ComponentHealthRegistry>) -> Self {
        Self {
            registry,
            log_control: RwLock::new(None),
            cleanup: RwLock::new(None),
            processing_throttled: AtomicBool::new(false),
        }
    }

    pub fn set_log_control(&self, control: Arc<dyn LogLevelControl>) {
        *self.log_control.write() = Some(control);
    }

    pub fn set_cleanup_hook(&self, hook: Arc<dyn CleanupHook>) {
        *self.cleanup.write() = Some(hook);
    }

    /// Set while CPU usage is at its critical threshold
    pub fn processing_throttled(&self) -> bool {
        self.processing_throttled.load(Ordering::Acquire)
    }

    pub async fn handle_constraint(
        &self,
        kind: ResourceKind,
        usage_percent: f64,
    ) -> Vec<GovernorAction> {
        let level = self.registry.update_resource(kind, usage_percent).await;
        let mut actions = Vec::new();

        match (kind, level) {
            (ResourceKind::Memory, ResourceLevel::Critical) => {
                let components = self
                    .registry
                    .disable_priority(ComponentPriority::Low, "memory usage critical")
                    .await;
                error!(
                    usage_percent,
                    disabled = components.len(),
                    "Memory critical, low-priority components disabled"
                );
                actions.push(GovernorAction::DisabledLowPriority { components });
            }
            (ResourceKind::Memory, ResourceLevel::Warning) => {
                warn!(usage_percent, "Memory above warning threshold, forcing cleanup");
                self.force_cleanup().await;
                actions.push(GovernorAction::ForcedCleanup);
            }
            (ResourceKind::Cpu, ResourceLevel::Critical) => {
                if !self.processing_throttled.swap(true, Ordering::AcqRel) {
                    error!(usage_percent, "CPU critical, reducing processing frequency");
                }
                actions.push(GovernorAction::ReducedProcessingFrequency);
            }
            (ResourceKind::Disk, ResourceLevel::Critical) => {
                error!(usage_percent, "Disk critical, lowering log verbosity to ERROR");
                self.lower_log_level();
                actions.push(GovernorAction::LogLevelLowered);
            }
            (_, ResourceLevel::Critical) => {
                error!(resource = %kind, usage_percent, "Resource at critical threshold");
            }
            (_, ResourceLevel::Warning) => {
                warn!(resource = %kind, usage_percent, "Resource above warning threshold");
            }
            (_, ResourceLevel::Normal) => {
                debug!(resource = %kind, usage_percent, "Resource usage normal");
            }
        }

        if kind == ResourceKind::Cpu
            && level != ResourceLevel::Critical
            && self.processing_throttled.swap(false, Ordering::AcqRel)
        {
            info!(usage_percent, "CPU recovered, processing frequency restored");
        }

        actions
    }

    /// Sample every resource once and handle each reading
    ///
    /// Sampling hits the OS, so it runs on the blocking pool.
    pub async fn poll_once<S: ResourceSampler>(
        &self,
        sampler: &Arc<Mutex<S>>,
    ) -> Vec<GovernorAction> {
        let sampler = Arc::clone(sampler);
        let samples = match tokio::task::spawn_blocking(move || sampler.lock().sample()).await {
            Ok(Ok(samples)) => samples,
            Ok(Err(sample_error)) => {
                warn!(error = %sample_error, "Resource sampling failed");
                return Vec::new();
            }
            Err(join_error) => {
                error!(error = %join_error, "Resource sampling task panicked");
                return Vec::new();
            }
        };

        let mut actions = Vec::new();
        for (kind, usage) in samples {
            actions.extend(self.handle_constraint(kind, usage).await);
        }
        actions
    }

    fn lower_log_level(&self) {
        let control = self.log_control.read().clone();
        match control {
            Some(control) => {
                if let Err(reload_error) = control.set_max_level(LevelFilter::ERROR) {
                    error!(error = %reload_error, "Failed to lower log level");
                }
            }
            None => warn!("No log level control installed, verbosity unchanged"),
        }
    }

    async fn force_cleanup(&self) {
        let hook = self.cleanup.read().clone();
        let Some(hook) = hook else {
            debug!("No cleanup hook installed");
            return;
        };

        match tokio::task::spawn_blocking(move || hook.cleanup()).await {
            Ok(Ok(())) => debug!("Forced cleanup completed"),
            Ok(Err(cleanup_error)) => warn!(error = %cleanup_error, "Forced cleanup failed"),
            Err(join_error) => error!(error = %join_error, "Cleanup task panicked"),
        }
    }
}

/// Samples CPU, memory and disk usage of the host
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        // First CPU reading is only meaningful relative to an earlier refresh
        system.refresh_cpu();
        Self { system }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&mut self) -> anyhow::Result<Vec<(ResourceKind, f64)>> {
        self.system.refresh_cpu();
        self.system.refresh_memory();

        let mut samples = vec![(
            ResourceKind::Cpu,
            f64::from(self.system.global_cpu_info().cpu_usage()),
        )];

        let total_memory = self.system.total_memory();
        if total_memory > 0 {
            let used = self.system.used_memory() as f64 / total_memory as f64 * 100.0;
            samples.push((ResourceKind::Memory, used));
        }

        let disks = Disks::new_with_refreshed_list();
        let (total, available) = disks.list().iter().fold((0u64, 0u64), |(total, available), disk| {
            (total + disk.total_space(), available + disk.available_space())
        });
        if total > 0 {
            let used = total.saturating_sub(available) as f64 / total as f64 * 100.0;
            samples.push((ResourceKind::Disk, used));
        }

        Ok(samples)
    }
}
