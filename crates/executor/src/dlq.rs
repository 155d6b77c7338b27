use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A gateway invocation that raised a transient error after its audit row
/// was already durably written — the gateway's own retry/backoff is out of
/// scope (spec.md §7 leaves re-enqueue to the caller); this is just the
/// holding pen so the failure is not silently dropped.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub agent_id: String,
    pub action_type: String,
    pub idempotency_key: Option<String>,
    pub payload: Map<String, Value>,
    pub error: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

/// Trait for dead-letter queue backends.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn push(&self, entry: DeadLetterEntry);
    async fn drain(&self) -> Vec<DeadLetterEntry>;
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-memory dead-letter queue, guarded by a [`Mutex`] never held across an
/// `.await` point.
pub struct DeadLetterQueue {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl DeadLetterQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, entry: DeadLetterEntry) {
        self.entries.lock().expect("dlq mutex poisoned").push(entry);
    }

    pub fn drain(&self) -> Vec<DeadLetterEntry> {
        let mut guard = self.entries.lock().expect("dlq mutex poisoned");
        std::mem::take(&mut *guard)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("dlq mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeadLetterSink for DeadLetterQueue {
    async fn push(&self, entry: DeadLetterEntry) {
        DeadLetterQueue::push(self, entry);
    }

    async fn drain(&self) -> Vec<DeadLetterEntry> {
        DeadLetterQueue::drain(self)
    }

    async fn len(&self) -> usize {
        DeadLetterQueue::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(error: &str, attempts: u32) -> DeadLetterEntry {
        DeadLetterEntry {
            agent_id: "forge".into(),
            action_type: "RUN_CMD".into(),
            idempotency_key: Some("k1".into()),
            payload: Map::new(),
            error: error.into(),
            attempts,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_queue_is_empty() {
        let dlq = DeadLetterQueue::new();
        assert!(dlq.is_empty());
    }

    #[test]
    fn push_increments_len() {
        let dlq = DeadLetterQueue::new();
        dlq.push(entry("boom", 1));
        dlq.push(entry("boom2", 2));
        assert_eq!(dlq.len(), 2);
    }

    #[test]
    fn drain_empties_queue_in_order() {
        let dlq = DeadLetterQueue::new();
        dlq.push(entry("e1", 1));
        dlq.push(entry("e2", 2));
        let drained = dlq.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].error, "e1");
        assert!(dlq.is_empty());
    }

    #[allow(dead_code)]
    fn _assert_dyn_sink(_: &dyn DeadLetterSink) {}
}
