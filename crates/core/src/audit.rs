use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An append-only record of one Tool Gateway invocation, allowed or denied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAuditRow {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub agent_id: String,
    pub action_type: String,
    pub working_dir: String,
    pub idempotency_key: Option<String>,
    pub allowed: bool,
    pub reason: String,
    pub payload: Map<String, Value>,
    pub result: Option<Map<String, Value>>,
    pub correlation_id: Option<String>,
}

/// A reservation record pinning exactly-one-execution semantics for a
/// caller-chosen idempotency key. Insertion is conditional: first writer
/// wins (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub created_ts: DateTime<Utc>,
    pub agent_id: String,
    pub action_type: String,
    pub event_id: Option<i64>,
    pub result: Option<Map<String, Value>>,
}

/// Last-writer-wins liveness record for one agent's worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub agent_id: String,
    pub consumer_id: String,
    pub pid: i64,
    pub ts: DateTime<Utc>,
}
