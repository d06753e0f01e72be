//! Fingerprint-keyed response cache
//!
//! Successful responses are stored under a SHA-256 fingerprint of the
//! normalized request and served until they are older than the TTL.
//! Expired entries are dropped lazily on lookup and in bulk by
//! [`ResponseCache::purge_expired`].

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::clock::{SharedClock, system_clock};
use crate::task::{TaskRequest, TaskResponse};

/// Default entry lifetime in milliseconds
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

/// Deterministic cache key for a preprocessed request
///
/// Covers the task type, required capabilities, system prompt, trimmed
/// prompt, generation parameters and any pinned provider/model. The
/// request id is excluded.
pub fn fingerprint(request: &TaskRequest) -> String {
    let capabilities: BTreeSet<String> = request.capabilities().into_iter().collect();
    let normalized = serde_json::json!({
        "task_type": request.task_type,
        "capabilities": capabilities,
        "system_prompt": request.system_prompt,
        "prompt": request.prompt.trim(),
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "provider": request.preferred_provider,
        "model": request.preferred_model,
    });

    let mut hasher = Sha256::new();
    hasher.update(normalized.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: TaskResponse,
    inserted_at: DateTime<Utc>,
}

/// TTL-bounded cache of successful responses
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: SharedClock,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MS)
    }
}

impl ResponseCache {
    /// Create a cache using wall-clock time
    pub fn new(ttl_ms: u64) -> Self {
        Self::with_clock(ttl_ms, system_clock())
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(ttl_ms: u64, clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::milliseconds(i64::try_from(ttl_ms).unwrap_or(i64::MAX)),
            clock,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at < self.ttl
    }

    /// Live entry for `fingerprint`, if any
    pub fn get(&self, fingerprint: &str) -> Option<TaskResponse> {
        let now = self.clock.now();
        let expired = match self.entries.get(fingerprint) {
            Some(entry) if self.is_fresh(&entry, now) => return Some(entry.response.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries
                .remove_if(fingerprint, |_, entry| !self.is_fresh(entry, now));
            debug!(fingerprint, "Dropped expired cache entry");
        }
        None
    }

    /// Store a response, replacing any previous entry
    pub fn insert(&self, fingerprint: impl Into<String>, response: TaskResponse) {
        self.entries.insert(
            fingerprint.into(),
            CacheEntry {
                response,
                inserted_at: self.clock.now(),
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::task::{FinishReason, TaskType, TokenUsage};

    fn response(text: &str) -> TaskResponse {
        TaskResponse {
            request_id: "req-1".to_string(),
            text: Some(text.to_string()),
            embedding: None,
            usage: TokenUsage::new(10, 5),
            latency_ms: 120,
            model: "gpt-4o".to_string(),
            provider: "openai".to_string(),
            finish_reason: FinishReason::Stop,
            cost_usd: 0.001,
            from_cache: false,
            fallback_depth: 0,
        }
    }

    #[test]
    fn test_fingerprint_ignores_request_id_and_whitespace() {
        let a = TaskRequest::new(TaskType::Chat, "hello world").with_request_id("one");
        let b = TaskRequest::new(TaskType::Chat, "  hello world\n").with_request_id("two");
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_fingerprint_distinguishes_parameters() {
        let base = TaskRequest::new(TaskType::Chat, "hello");
        let other_type = TaskRequest::new(TaskType::Code, "hello");
        let other_temp = TaskRequest::new(TaskType::Chat, "hello").with_temperature(0.2);
        let pinned = TaskRequest::new(TaskType::Chat, "hello")
            .with_preferred("openai", Some("gpt-4o".to_string()));
        let vision = TaskRequest::new(TaskType::Chat, "hello").with_capabilities(["chat", "vision"]);

        let fp = fingerprint(&base);
        assert_ne!(fp, fingerprint(&other_type));
        assert_ne!(fp, fingerprint(&other_temp));
        assert_ne!(fp, fingerprint(&pinned));
        assert_ne!(fp, fingerprint(&vision));
    }

    #[test]
    fn test_fingerprint_uses_effective_capabilities() {
        let implicit = TaskRequest::new(TaskType::Chat, "hello");
        let explicit = TaskRequest::new(TaskType::Chat, "hello").with_capabilities(["chat"]);
        assert_eq!(fingerprint(&implicit), fingerprint(&explicit));

        let a = TaskRequest::new(TaskType::Chat, "hello").with_capabilities(["vision", "chat"]);
        let b = TaskRequest::new(TaskType::Chat, "hello").with_capabilities(["chat", "vision"]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_get_within_ttl() {
        let clock = ManualClock::starting_now();
        let cache = ResponseCache::with_clock(1_000, clock.clone());

        cache.insert("abc", response("cached"));
        clock.advance_ms(999);

        assert_eq!(cache.get("abc").unwrap().text.as_deref(), Some("cached"));
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let clock = ManualClock::starting_now();
        let cache = ResponseCache::with_clock(1_000, clock.clone());

        cache.insert("abc", response("cached"));
        clock.advance_ms(1_000);

        assert!(cache.get("abc").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = ResponseCache::default();
        cache.insert("abc", response("first"));
        cache.insert("abc", response("second"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("abc").unwrap().text.as_deref(), Some("second"));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let clock = ManualClock::starting_now();
        let cache = ResponseCache::with_clock(u64::MAX, clock.clone());

        cache.insert("abc", response("kept"));
        clock.advance_ms(365 * 24 * 60 * 60 * 1000);

        assert!(cache.get("abc").is_some());
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let clock = ManualClock::starting_now();
        let cache = ResponseCache::with_clock(1_000, clock.clone());

        cache.insert("old", response("old"));
        clock.advance_ms(600);
        cache.insert("new", response("new"));
        clock.advance_ms(600);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
