//! Task requests, candidates and the normalized response envelope

mod response;
mod types;

pub use response::{FinishReason, TaskResponse, TokenUsage};
pub use types::{Candidate, TaskRequest, TaskType};
