//! # Health and Graceful Degradation
//!
//! Component health tracking and resource-driven degradation.
//!
//! - [`ComponentHealthRegistry`] holds named components with priority tiers and
//!   applies disable/degrade/restart transitions when failures are reported. It
//!   derives the overall [`SystemState`] after every mutation.
//! - [`ResourceGovernor`] compares resource-usage samples against per-kind
//!   thresholds and issues [`GovernorAction`]s. It is poll-driven and owns no timers.
//! - [`ResourceSampler`] and [`StateValidator`] feed the background loops started
//!   by the resilience context.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod component_registry;
pub mod resource_governor;

pub use component_registry::{
    ComponentHealthRegistry, ComponentPriority, ComponentStatus, DegradationOutcome,
    DegradationResult, HealthSnapshot, ResourceConstraint, ResourceLevel, RestartHandler,
    SystemState,
};
pub use resource_governor::{
    CleanupHook, GovernorAction, ResourceGovernor, ResourceSampler, StateValidator,
    SysinfoSampler,
};

/// Resources with usage thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Cpu,
        ResourceKind::Memory,
        ResourceKind::Disk,
        ResourceKind::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::Disk => "disk",
            ResourceKind::Network => "network",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
