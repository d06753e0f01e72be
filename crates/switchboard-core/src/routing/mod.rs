//! Adaptive candidate selection
//!
//! The routing optimizer keeps a learned score per (candidate, task type)
//! pair and blends it with the performance predictor's view of the pending
//! request.
//!
//! ## How It Works
//!
//! 1. The orchestrator passes the eligible candidates and their predictions
//! 2. With probability `exploration_rate` a candidate is picked uniformly at random
//! 3. Otherwise the highest combined historical/predicted score wins
//! 4. After the attempt completes, the outcome is folded back into the score
//!
//! ## Example
//!
//! ```rust,ignore
//! use switchboard_core::routing::{RoutingOptimizer, Strategy};
//! use switchboard_core::config::RoutingConfig;
//!
//! let optimizer = RoutingOptimizer::new(RoutingConfig::default());
//! let decision = optimizer
//!     .select_optimal_model(&candidates, &predictions, TaskType::Chat, Strategy::Balanced, true)
//!     .expect("at least one candidate");
//!
//! // Dispatch to decision.candidate...
//!
//! optimizer.update_from_result(&decision.candidate, TaskType::Chat, true, latency_ms, cost_usd);
//! ```

mod optimizer;
mod types;

pub use optimizer::{NEUTRAL_SCORE, RoutingOptimizer};
pub use types::{RoutingDecision, RoutingReason, ScoreWeights, Strategy, StrategyWeights};
