//! Switchboard Core Library
//!
//! Adaptive model-request orchestration. This crate provides:
//! - Task orchestration with caching and sibling-provider fallback
//! - Per-candidate circuit breakers
//! - Performance prediction from rolling statistics
//! - Learned routing scores with explicit exploration
//! - Business value tracking (SLA compliance, cost savings, ROI)
//! - Provider adapter, capability registry and metrics sink interfaces

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod prediction;
pub mod pricing;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod routing;
pub mod task;
pub mod tracker;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::OrchestratorConfig;
    pub use crate::error::{Error, Result};
    pub use crate::metrics::{ExecutionRecord, MetricsSink};
    pub use crate::orchestrator::{ExecuteOptions, Orchestrator, OrchestratorBuilder};
    pub use crate::provider::{ProviderAdapter, ProviderError};
    pub use crate::registry::{CapabilityRegistry, StaticCapabilityRegistry};
    pub use crate::routing::Strategy;
    pub use crate::task::{Candidate, TaskRequest, TaskResponse, TaskType};
}
