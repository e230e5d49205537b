// ABOUTME: Deduplication store for inbound events with time-based eviction.
// ABOUTME: Keys are "{kind}:{event_ts}"; entries expire after the retention horizon.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long a processed key suppresses reprocessing.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Tracks event keys already handled by this process.
///
/// Check-and-store happens under one lock, so two concurrent deliveries of
/// the same key cannot both pass. Expired entries are evicted inline whenever
/// a new key is recorded; there is no background sweeper.
pub struct DedupStore {
    seen: Mutex<HashMap<String, Instant>>,
    retention: Duration,
}

impl Default for DedupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupStore {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Build the composite key for an event kind and its platform timestamp.
    pub fn key(kind: &str, event_ts: &str) -> String {
        format!("{}:{}", kind, event_ts)
    }

    /// Returns true if this event was already handled within the retention
    /// horizon. Otherwise records it and returns false.
    ///
    /// An empty `event_ts` is never a duplicate.
    pub fn seen_before(&self, kind: &str, event_ts: &str) -> bool {
        self.seen_before_at(kind, event_ts, Instant::now())
    }

    /// Same as [`seen_before`](Self::seen_before) with an explicit clock.
    pub fn seen_before_at(&self, kind: &str, event_ts: &str, now: Instant) -> bool {
        if event_ts.is_empty() {
            return false;
        }

        let key = Self::key(kind, event_ts);
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(first_seen) = seen.get(&key) {
            if now.saturating_duration_since(*first_seen) <= self.retention {
                debug!(key = %key, "Skipping duplicate event");
                return true;
            }
        }

        seen.insert(key, now);
        let retention = self.retention;
        seen.retain(|_, at| now.saturating_duration_since(*at) <= retention);
        false
    }

    /// Number of keys currently retained.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
