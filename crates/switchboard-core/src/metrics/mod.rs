//! Execution records and the sinks that receive them
//!
//! The orchestrator emits one [`ExecutionRecord`] per dispatched attempt,
//! including every fallback attempt. Cache hits are not attempts and emit
//! nothing.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::routing::Strategy;
use crate::task::{Candidate, TaskType};

/// Append-only fact describing one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub request_id: String,
    pub provider: String,
    pub model: String,
    pub task_type: TaskType,
    pub duration_ms: u64,
    pub success: bool,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fallback_depth: u32,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    /// The candidate this attempt was dispatched to
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.provider.clone(), self.model.clone())
    }
}

/// Destination for execution records
pub trait MetricsSink: Send + Sync {
    /// Accept one record; must not block for long
    fn record(&self, record: ExecutionRecord);
}

/// Shared sink handle
pub type SharedMetricsSink = Arc<dyn MetricsSink>;

/// Emits each record as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record(&self, record: ExecutionRecord) {
        if record.success {
            info!(
                target: "switchboard::execution",
                request_id = %record.request_id,
                provider = %record.provider,
                model = %record.model,
                task_type = %record.task_type,
                strategy = %record.strategy,
                duration_ms = record.duration_ms,
                fallback_depth = record.fallback_depth,
                "Execution succeeded"
            );
        } else {
            warn!(
                target: "switchboard::execution",
                request_id = %record.request_id,
                provider = %record.provider,
                model = %record.model,
                task_type = %record.task_type,
                strategy = %record.strategy,
                duration_ms = record.duration_ms,
                fallback_depth = record.fallback_depth,
                error = record.error.as_deref().unwrap_or("unknown"),
                "Execution failed"
            );
        }
    }
}

/// Keeps the most recent records in memory
#[derive(Debug)]
pub struct InMemoryMetricsSink {
    records: Mutex<VecDeque<ExecutionRecord>>,
    capacity: usize,
}

impl Default for InMemoryMetricsSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl InMemoryMetricsSink {
    /// Create a sink retaining at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Copy of the retained records, oldest first
    pub fn snapshot(&self) -> Vec<ExecutionRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Records for one request, oldest first
    pub fn for_request(&self, request_id: &str) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(&self, record: ExecutionRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(request_id: &str, success: bool) -> ExecutionRecord {
        ExecutionRecord {
            request_id: request_id.to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            task_type: TaskType::Chat,
            duration_ms: 250,
            success,
            strategy: Strategy::Balanced,
            error: (!success).then(|| "network error".to_string()),
            fallback_depth: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_in_memory_sink_is_bounded() {
        let sink = InMemoryMetricsSink::new(2);
        sink.record(record("a", true));
        sink.record(record("b", false));
        sink.record(record("c", true));

        let ids: Vec<_> = sink.snapshot().into_iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_for_request_filters() {
        let sink = InMemoryMetricsSink::default();
        sink.record(record("a", false));
        sink.record(record("b", true));
        sink.record(record("a", true));

        let records = sink.for_request("a");
        assert_eq!(records.len(), 2);
        assert!(!records[0].success);
        assert!(records[1].success);
        assert_eq!(records[0].candidate(), Candidate::new("openai", "gpt-4o"));
    }

    #[test]
    fn test_record_serializes_without_empty_error() {
        let json = serde_json::to_string(&record("a", true)).unwrap();
        assert!(!json.contains("\"error\""));
        assert!(json.contains("\"task_type\":\"chat\""));
    }

    #[test]
    fn test_tracing_sink_accepts_records() {
        let sink: SharedMetricsSink = Arc::new(TracingMetricsSink);
        sink.record(record("a", true));
        sink.record(record("b", false));
    }
}
