//! Task orchestration
//!
//! The [`Orchestrator`] ties the components together for every request:
//!
//! 1. Preprocess: inject a default system prompt, apply static routing rules
//! 2. Serve a live cache hit without touching any statistics
//! 3. Gather candidates (a pinned candidate, or the capability registry's answer)
//! 4. Predict performance and let the routing optimizer pick among open gates
//! 5. Dispatch through the provider adapter, bounded by the timeout
//! 6. Learn from the outcome and emit an execution record
//! 7. On a retryable failure, walk the primary provider's fallback chain
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchboard_core::prelude::*;
//!
//! let orchestrator = Arc::new(
//!     Orchestrator::builder()
//!         .adapter(Arc::new(openai_adapter))
//!         .adapter(Arc::new(anthropic_adapter))
//!         .build()?,
//! );
//! let maintenance = orchestrator.spawn_maintenance(orchestrator.maintenance_interval());
//!
//! let response = orchestrator
//!     .execute_task(
//!         TaskRequest::new(TaskType::Summarization, document),
//!         ExecuteOptions::new().with_strategy(Strategy::CostOptimized),
//!     )
//!     .await?;
//! ```

mod builder;
mod executor;
mod options;
mod preprocess;

pub use builder::OrchestratorBuilder;
pub use executor::{MaintenanceReport, Orchestrator};
pub use options::ExecuteOptions;
pub use preprocess::{default_system_prompt, prepare};
