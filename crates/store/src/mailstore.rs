use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hiveguard_core::{Event, EventStatus, IdempotencyRecord, NewEvent, ToolAuditRow, WorkerHeartbeat};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::schema;

/// Embedded, crash-safe store backing every cross-process event, lease,
/// tool-audit, idempotency, and heartbeat row (spec.md §4.1).
///
/// All blocking SQLite work runs on `tokio::task::spawn_blocking`, guarded by
/// an in-process [`Mutex`] so concurrent callers within this process never
/// race each other; cross-process serialization is provided by SQLite's own
/// WAL + busy-timeout machinery.
#[derive(Clone)]
pub struct MailStore {
    conn: Arc<Mutex<Connection>>,
}

impl MailStore {
    /// Open (creating if absent) the MailStore database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store, used by tests and the replay harness.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("mailstore mutex poisoned");
            f(&guard)
        })
        .await?
    }

    /// Append a new event, normalizing it via [`NewEvent::validate`] and
    /// assigning the next monotonic id.
    pub async fn append_event(&self, draft: NewEvent) -> Result<i64, StoreError> {
        draft
            .validate()
            .map_err(|e| StoreError::Sqlite(rusqlite::Error::InvalidParameterName(e.to_string())))?;
        self.with_conn(move |conn| {
            let now = Utc::now();
            let payload = Value::Object(draft.payload.clone()).to_string();
            conn.execute(
                "INSERT INTO events (timestamp, event_type, origin_id, target_agent, correlation_id, payload, justification, status, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
                params![
                    now.to_rfc3339(),
                    draft.event_type,
                    draft.origin_id,
                    draft.target_agent,
                    draft.correlation_id,
                    payload,
                    draft.justification,
                    EventStatus::Pending.to_string(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Claim the lowest-id `PENDING` event matching the routing filter,
    /// polling at `poll_interval` up to `timeout`. Reaps expired leases
    /// before every attempt.
    pub async fn claim_next_event(
        &self,
        consumer_id: &str,
        timeout: Duration,
        target_agent: Option<&str>,
        include_unrouted: bool,
        lease_seconds: i64,
        poll_interval: Duration,
    ) -> Result<Option<Event>, StoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let claimed = self
                .try_claim_once(consumer_id, target_agent, include_unrouted, lease_seconds)
                .await?;
            if claimed.is_some() {
                return Ok(claimed);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll_interval.min(deadline - tokio::time::Instant::now())).await;
        }
    }

    async fn try_claim_once(
        &self,
        consumer_id: &str,
        target_agent: Option<&str>,
        include_unrouted: bool,
        lease_seconds: i64,
    ) -> Result<Option<Event>, StoreError> {
        let consumer_id = consumer_id.to_owned();
        let target_agent = target_agent.map(str::to_owned);
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let now = Utc::now();

            reap_expired_leases(&tx, now)?;

            let row = select_claimable(&tx, target_agent.as_deref(), include_unrouted)?;
            let Some(event_id) = row else {
                tx.commit()?;
                return Ok(None);
            };

            let expiry = now + chrono::Duration::seconds(lease_seconds);
            tx.execute(
                "INSERT INTO leases (event_id, claimed_by, claim_ts, lease_expiry) VALUES (?1, ?2, ?3, ?4)",
                params![event_id, consumer_id, now.to_rfc3339(), expiry.to_rfc3339()],
            )?;
            tx.execute(
                "UPDATE events SET status = ?1 WHERE id = ?2",
                params![EventStatus::Claimed.to_string(), event_id],
            )?;

            let event = load_event(&tx, event_id)?;
            tx.commit()?;
            Ok(event)
        })
        .await
    }

    /// Acknowledge successful processing, verifying `consumer_id` (if given)
    /// holds the live lease, and transition the event to `DONE`.
    pub async fn ack_event(&self, id: i64, consumer_id: Option<&str>) -> Result<(), StoreError> {
        self.finish_event(id, consumer_id, EventStatus::Done, None).await
    }

    /// Transition an event to `FAILED` with the given error message.
    pub async fn fail_event(
        &self,
        id: i64,
        error: &str,
        consumer_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.finish_event(id, consumer_id, EventStatus::Failed, Some(error.to_owned()))
            .await
    }

    /// Send an event back to `PENDING`, releasing its lease.
    pub async fn requeue_event(
        &self,
        id: i64,
        consumer_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.finish_event(id, consumer_id, EventStatus::Pending, error.map(str::to_owned))
            .await
    }

    async fn finish_event(
        &self,
        id: i64,
        consumer_id: Option<&str>,
        status: EventStatus,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let consumer_id = consumer_id.map(str::to_owned);
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let held_by: Option<String> = tx
                .query_row(
                    "SELECT claimed_by FROM leases WHERE event_id = ?1",
                    params![id],
                    |r| r.get(0),
                )
                .optional()?;

            match (&held_by, &consumer_id) {
                (None, _) => return Err(StoreError::NoLease(id)),
                (Some(holder), Some(requested)) if holder != requested => {
                    return Err(StoreError::LeaseMismatch {
                        event_id: id,
                        consumer: requested.clone(),
                    });
                }
                _ => {}
            }

            tx.execute("DELETE FROM leases WHERE event_id = ?1", params![id])?;
            tx.execute(
                "UPDATE events SET status = ?1, error = ?2 WHERE id = ?3",
                params![status.to_string(), error, id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Append one tool-audit row. Every Tool Gateway invocation writes
    /// exactly one of these, allowed or denied (spec.md §4.4).
    #[allow(clippy::too_many_arguments)]
    pub async fn append_tool_audit(
        &self,
        agent_id: &str,
        action_type: &str,
        working_dir: &str,
        idempotency_key: Option<&str>,
        allowed: bool,
        reason: &str,
        payload: Map<String, Value>,
        result: Option<Map<String, Value>>,
        correlation_id: Option<&str>,
    ) -> Result<i64, StoreError> {
        let agent_id = agent_id.to_owned();
        let action_type = action_type.to_owned();
        let working_dir = working_dir.to_owned();
        let idempotency_key = idempotency_key.map(str::to_owned);
        let reason = reason.to_owned();
        let correlation_id = correlation_id.map(str::to_owned);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tool_audit (ts, agent_id, action_type, working_dir, idempotency_key, allowed, reason, payload, result, correlation_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    Utc::now().to_rfc3339(),
                    agent_id,
                    action_type,
                    working_dir,
                    idempotency_key,
                    i64::from(allowed),
                    reason,
                    Value::Object(payload).to_string(),
                    result.map(|m| Value::Object(m).to_string()),
                    correlation_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Return the most recent `limit` tool-audit rows, newest last.
    pub async fn list_tool_audit(&self, limit: i64) -> Result<Vec<ToolAuditRow>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ts, agent_id, action_type, working_dir, idempotency_key, allowed, reason, payload, result, correlation_id
                 FROM tool_audit ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], row_to_tool_audit)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().rev().collect())
        })
        .await
    }

    /// Return all events with the given `status`, or every event if `None`.
    pub async fn list_events(&self, status: Option<EventStatus>) -> Result<Vec<Event>, StoreError> {
        self.with_conn(move |conn| {
            let mut rows = Vec::new();
            let mut stmt = if status.is_some() {
                conn.prepare("SELECT id FROM events WHERE status = ?1 ORDER BY id ASC")?
            } else {
                conn.prepare("SELECT id FROM events ORDER BY id ASC")?
            };
            let ids: Vec<i64> = if let Some(s) = status {
                stmt.query_map(params![s.to_string()], |r| r.get(0))?
                    .collect::<Result<_, _>>()?
            } else {
                stmt.query_map([], |r| r.get(0))?.collect::<Result<_, _>>()?
            };
            for id in ids {
                if let Some(event) = load_event(conn, id)? {
                    rows.push(event);
                }
            }
            Ok(rows)
        })
        .await
    }

    /// Count events grouped by status.
    pub async fn status_counts(&self) -> Result<HashMap<String, i64>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM events GROUP BY status")?;
            let rows = stmt
                .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().collect())
        })
        .await
    }

    /// Fetch a single event by id.
    pub async fn get_event(&self, id: i64) -> Result<Option<Event>, StoreError> {
        self.with_conn(move |conn| load_event(conn, id)).await
    }

    /// Atomically reserve an idempotency key; returns `true` exactly once
    /// across the key's lifetime.
    pub async fn reserve_idempotency_key(
        &self,
        key: &str,
        agent_id: &str,
        action_type: &str,
        event_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let key = key.to_owned();
        let agent_id = agent_id.to_owned();
        let action_type = action_type.to_owned();
        self.with_conn(move |conn| {
            let res = conn.execute(
                "INSERT INTO idempotency_keys (key, created_ts, agent_id, action_type, event_id, result)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL)
                 ON CONFLICT(key) DO NOTHING",
                params![key, Utc::now().to_rfc3339(), agent_id, action_type, event_id],
            )?;
            Ok(res == 1)
        })
        .await
    }

    /// Fetch an idempotency record, if it exists.
    pub async fn get_idempotency_record(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        let key = key.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT key, created_ts, agent_id, action_type, event_id, result FROM idempotency_keys WHERE key = ?1",
                params![key],
                row_to_idempotency,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    /// Attach an execution result to an already-reserved idempotency key.
    pub async fn set_idempotency_result(
        &self,
        key: &str,
        result: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let key = key.to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE idempotency_keys SET result = ?1 WHERE key = ?2",
                params![Value::Object(result).to_string(), key],
            )?;
            Ok(())
        })
        .await
    }

    /// Record a liveness heartbeat for a worker, last-writer-wins per agent.
    pub async fn record_worker_heartbeat(
        &self,
        agent_id: &str,
        consumer_id: &str,
        pid: i64,
        ts: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let agent_id = agent_id.to_owned();
        let consumer_id = consumer_id.to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO worker_heartbeats (agent_id, consumer_id, pid, ts) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(agent_id) DO UPDATE SET consumer_id = excluded.consumer_id, pid = excluded.pid, ts = excluded.ts",
                params![agent_id, consumer_id, pid, ts.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    /// Fetch the latest heartbeat recorded for `agent_id`.
    pub async fn get_worker_heartbeat(&self, agent_id: &str) -> Result<Option<WorkerHeartbeat>, StoreError> {
        let agent_id = agent_id.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT agent_id, consumer_id, pid, ts FROM worker_heartbeats WHERE agent_id = ?1",
                params![agent_id],
                |r| {
                    Ok(WorkerHeartbeat {
                        agent_id: r.get(0)?,
                        consumer_id: r.get(1)?,
                        pid: r.get(2)?,
                        ts: parse_ts(r.get::<_, String>(3)?),
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }
}

fn reap_expired_leases(tx: &rusqlite::Transaction<'_>, now: DateTime<Utc>) -> Result<(), StoreError> {
    let expired: Vec<i64> = {
        let mut stmt = tx.prepare("SELECT event_id FROM leases WHERE lease_expiry <= ?1")?;
        stmt.query_map(params![now.to_rfc3339()], |r| r.get(0))?
            .collect::<Result<_, _>>()?
    };
    for event_id in expired {
        debug!(event_id, "reaping expired lease");
        tx.execute("DELETE FROM leases WHERE event_id = ?1", params![event_id])?;
        tx.execute(
            "UPDATE events SET status = ?1 WHERE id = ?2",
            params![EventStatus::Pending.to_string(), event_id],
        )?;
    }
    Ok(())
}

fn select_claimable(
    tx: &rusqlite::Transaction<'_>,
    target_agent: Option<&str>,
    include_unrouted: bool,
) -> Result<Option<i64>, StoreError> {
    let sql = match target_agent {
        Some(_) if include_unrouted => {
            "SELECT id FROM events WHERE status = 'PENDING' AND (target_agent = ?1 OR target_agent IS NULL) ORDER BY id ASC LIMIT 1"
        }
        Some(_) => "SELECT id FROM events WHERE status = 'PENDING' AND target_agent = ?1 ORDER BY id ASC LIMIT 1",
        None => "SELECT id FROM events WHERE status = 'PENDING' ORDER BY id ASC LIMIT 1",
    };
    let mut stmt = tx.prepare(sql)?;
    let id = if target_agent.is_some() {
        stmt.query_row(params![target_agent], |r| r.get(0)).optional()?
    } else {
        stmt.query_row([], |r| r.get(0)).optional()?
    };
    Ok(id)
}

fn load_event(conn: &Connection, id: i64) -> Result<Option<Event>, StoreError> {
    conn.query_row(
        "SELECT id, timestamp, event_type, origin_id, target_agent, correlation_id, payload, justification, status, error
         FROM events WHERE id = ?1",
        params![id],
        row_to_event,
    )
    .optional()
    .map_err(StoreError::from)
}

fn row_to_event(r: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: r.get(0)?,
        timestamp: parse_ts(r.get::<_, String>(1)?),
        event_type: r.get(2)?,
        origin_id: r.get(3)?,
        target_agent: r.get(4)?,
        correlation_id: r.get(5)?,
        payload: parse_payload(r.get::<_, String>(6)?),
        justification: r.get(7)?,
        status: parse_status(r.get::<_, String>(8)?),
        error: r.get(9)?,
    })
}

fn row_to_tool_audit(r: &rusqlite::Row<'_>) -> rusqlite::Result<ToolAuditRow> {
    Ok(ToolAuditRow {
        id: r.get(0)?,
        ts: parse_ts(r.get::<_, String>(1)?),
        agent_id: r.get(2)?,
        action_type: r.get(3)?,
        working_dir: r.get(4)?,
        idempotency_key: r.get(5)?,
        allowed: r.get::<_, i64>(6)? != 0,
        reason: r.get(7)?,
        payload: parse_payload(r.get::<_, String>(8)?),
        result: r
            .get::<_, Option<String>>(9)?
            .map(parse_payload),
        correlation_id: r.get(10)?,
    })
}

fn row_to_idempotency(r: &rusqlite::Row<'_>) -> rusqlite::Result<IdempotencyRecord> {
    Ok(IdempotencyRecord {
        key: r.get(0)?,
        created_ts: parse_ts(r.get::<_, String>(1)?),
        agent_id: r.get(2)?,
        action_type: r.get(3)?,
        event_id: r.get(4)?,
        result: r.get::<_, Option<String>>(5)?.map(parse_payload),
    })
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            warn!(raw = %s, "unparsable timestamp in store, defaulting to epoch");
            DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is always representable")
        })
}

fn parse_status(s: String) -> EventStatus {
    match s.as_str() {
        "PENDING" => EventStatus::Pending,
        "CLAIMED" => EventStatus::Claimed,
        "DONE" => EventStatus::Done,
        _ => EventStatus::Failed,
    }
}

fn parse_payload(s: String) -> Map<String, Value> {
    match serde_json::from_str::<Value>(&s) {
        Ok(Value::Object(m)) => m,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn append_and_claim_roundtrip() {
        let store = MailStore::open_in_memory().unwrap();
        let id = store
            .append_event(NewEvent::new("TOOL_REQUEST", "recon").with_target_agent("forge"))
            .await
            .unwrap();
        assert_eq!(id, 1);

        let claimed = store
            .claim_next_event(
                "worker:forge:1",
                StdDuration::from_millis(50),
                Some("forge"),
                false,
                30,
                StdDuration::from_millis(10),
            )
            .await
            .unwrap()
            .expect("event should be claimable");
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.status, EventStatus::Claimed);

        store.ack_event(id, Some("worker:forge:1")).await.unwrap();
        let event = store.get_event(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Done);
    }

    #[tokio::test]
    async fn claim_respects_routing_filter() {
        let store = MailStore::open_in_memory().unwrap();
        store
            .append_event(NewEvent::new("TOOL_REQUEST", "recon").with_target_agent("command"))
            .await
            .unwrap();
        let claimed = store
            .claim_next_event(
                "worker:forge:1",
                StdDuration::from_millis(30),
                Some("forge"),
                false,
                30,
                StdDuration::from_millis(10),
            )
            .await
            .unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn ack_with_wrong_consumer_fails() {
        let store = MailStore::open_in_memory().unwrap();
        let id = store
            .append_event(NewEvent::new("TOOL_REQUEST", "recon"))
            .await
            .unwrap();
        store
            .claim_next_event(
                "worker:a:1",
                StdDuration::from_millis(30),
                None,
                false,
                30,
                StdDuration::from_millis(10),
            )
            .await
            .unwrap();
        let err = store.ack_event(id, Some("worker:b:1")).await.unwrap_err();
        assert!(matches!(err, StoreError::LeaseMismatch { .. }));
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed() {
        let store = MailStore::open_in_memory().unwrap();
        let id = store
            .append_event(NewEvent::new("TOOL_REQUEST", "recon"))
            .await
            .unwrap();
        store
            .claim_next_event(
                "worker:a:1",
                StdDuration::from_millis(30),
                None,
                false,
                0,
                StdDuration::from_millis(10),
            )
            .await
            .unwrap();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        let reclaimed = store
            .claim_next_event(
                "worker:b:1",
                StdDuration::from_millis(50),
                None,
                false,
                30,
                StdDuration::from_millis(10),
            )
            .await
            .unwrap()
            .expect("expired lease should be reclaimable");
        assert_eq!(reclaimed.id, id);
    }

    #[tokio::test]
    async fn idempotency_key_reserved_once() {
        let store = MailStore::open_in_memory().unwrap();
        let first = store
            .reserve_idempotency_key("k1", "forge", "RUN_CMD", None)
            .await
            .unwrap();
        let second = store
            .reserve_idempotency_key("k1", "forge", "RUN_CMD", None)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn tool_audit_rows_persist() {
        let store = MailStore::open_in_memory().unwrap();
        let id = store
            .append_tool_audit(
                "forge",
                "RUN_CMD",
                "/workspaces/forge",
                Some("k1"),
                true,
                "ok",
                Map::new(),
                None,
                None,
            )
            .await
            .unwrap();
        let rows = store.list_tool_audit(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert!(rows[0].allowed);
    }
}
