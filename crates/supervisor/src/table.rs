use chrono::{DateTime, Utc};
use tokio::process::Child;

/// In-process bookkeeping for one supervised worker. Owned exclusively by
/// the supervisor process (spec.md §5: "no shared memory").
pub struct WorkerRecord {
    pub agent_id: String,
    pub consumer_id: String,
    pub child: Option<Child>,
    pub restart_count: u32,
    pub restart_history: Vec<DateTime<Utc>>,
    pub scheduled_restart_at: Option<DateTime<Utc>>,
    pub disabled: bool,
    pub last_heartbeat_published: Option<DateTime<Utc>>,
}

impl WorkerRecord {
    #[must_use]
    pub fn new(agent_id: String, consumer_id: String, child: Child) -> Self {
        Self {
            agent_id,
            consumer_id,
            child: Some(child),
            restart_count: 0,
            restart_history: Vec::new(),
            scheduled_restart_at: None,
            disabled: false,
            last_heartbeat_published: None,
        }
    }

    /// Drop any restart-history entries older than `window_seconds`.
    pub fn prune_history(&mut self, now: DateTime<Utc>, window_seconds: i64) {
        let cutoff = now - chrono::Duration::seconds(window_seconds);
        self.restart_history.retain(|ts| *ts >= cutoff);
    }
}
