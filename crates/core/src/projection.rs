use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Coarse office-wide mode derived from worker liveness and queue depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfficeMode {
    Running,
    Paused,
}

/// Liveness state of a single agent's worker process, as tracked by the
/// projector from `WORKER_STARTED`/`WORKER_EXITED`/heartbeat events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Idle,
    Active,
    Restarting,
    Offline,
}

/// Per-agent worker bookkeeping, keyed by agent id in [`ProjectionView::workers`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEntry {
    pub present: bool,
    pub state: WorkerState,
    pub last_event_type: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub restart_count: u32,
    pub missed_heartbeat_count: u32,
    pub last_seen_event_id: Option<i64>,
}

impl Default for WorkerEntry {
    fn default() -> Self {
        Self {
            present: false,
            state: WorkerState::Offline,
            last_event_type: None,
            last_event_at: None,
            restart_count: 0,
            missed_heartbeat_count: 0,
            last_seen_event_id: None,
        }
    }
}

/// Tally of allowed vs. denied Tool Gateway invocations observed so far.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ToolAuditCounts {
    pub allowed: u64,
    pub denied: u64,
}

/// Values computed from the rest of the view rather than carried directly
/// from the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Derived {
    pub office_mode: OfficeMode,
    pub stress_level: f64,
}

impl Default for Derived {
    fn default() -> Self {
        Self {
            office_mode: OfficeMode::Paused,
            stress_level: 0.0,
        }
    }
}

/// The read-only, deterministically-derived snapshot the Projection
/// Materializer writes after each batch of events (spec.md §4).
///
/// Two independent projector runs fed the same event log must produce
/// byte-identical views once serialized through
/// [`crate::canonical::to_canonical_string`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionView {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub last_seen_event_id: i64,
    pub last_seen_tool_audit_id: i64,
    pub running: bool,
    pub event_queue_size: u64,
    pub current_event: Option<Event>,
    pub events_processed: u64,
    pub event_type_counts: HashMap<String, u64>,
    pub tool_audit_counts: ToolAuditCounts,
    pub workers: HashMap<String, WorkerEntry>,
    pub derived: Derived,
}

impl Default for ProjectionView {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            schema_version: 1,
            timestamp: now,
            last_updated_at: now,
            last_seen_event_id: 0,
            last_seen_tool_audit_id: 0,
            running: false,
            event_queue_size: 0,
            current_event: None,
            events_processed: 0,
            event_type_counts: HashMap::new(),
            tool_audit_counts: ToolAuditCounts::default(),
            workers: HashMap::new(),
            derived: Derived::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_view_is_paused_and_empty() {
        let view = ProjectionView::default();
        assert_eq!(view.derived.office_mode, OfficeMode::Paused);
        assert_eq!(view.events_processed, 0);
        assert!(view.workers.is_empty());
    }

    #[test]
    fn default_worker_entry_is_offline() {
        let entry = WorkerEntry::default();
        assert_eq!(entry.state, WorkerState::Offline);
        assert!(!entry.present);
    }
}
