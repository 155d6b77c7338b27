use rusqlite::Connection;

use crate::error::StoreError;

/// Apply the durability pragmas and create the MailStore schema if absent.
///
/// WAL mode plus a busy timeout gives the claim transaction serializable
/// semantics without requiring every process to coordinate locking itself
/// (spec.md §4.1).
pub fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "busy_timeout", 5_000)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS events (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp       TEXT NOT NULL,
            event_type      TEXT NOT NULL,
            origin_id       TEXT NOT NULL,
            target_agent    TEXT,
            correlation_id  TEXT,
            payload         TEXT NOT NULL,
            justification   TEXT,
            status          TEXT NOT NULL,
            error           TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_events_status_id ON events(status, id);
        CREATE INDEX IF NOT EXISTS idx_events_target ON events(target_agent, status, id);

        CREATE TABLE IF NOT EXISTS leases (
            event_id    INTEGER PRIMARY KEY,
            claimed_by  TEXT NOT NULL,
            claim_ts    TEXT NOT NULL,
            lease_expiry TEXT NOT NULL,
            FOREIGN KEY(event_id) REFERENCES events(id)
        );

        CREATE TABLE IF NOT EXISTS tool_audit (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            ts              TEXT NOT NULL,
            agent_id        TEXT NOT NULL,
            action_type     TEXT NOT NULL,
            working_dir     TEXT NOT NULL,
            idempotency_key TEXT,
            allowed         INTEGER NOT NULL,
            reason          TEXT NOT NULL,
            payload         TEXT NOT NULL,
            result          TEXT,
            correlation_id  TEXT
        );

        CREATE TABLE IF NOT EXISTS idempotency_keys (
            key         TEXT PRIMARY KEY,
            created_ts  TEXT NOT NULL,
            agent_id    TEXT NOT NULL,
            action_type TEXT NOT NULL,
            event_id    INTEGER,
            result      TEXT
        );

        CREATE TABLE IF NOT EXISTS worker_heartbeats (
            agent_id    TEXT PRIMARY KEY,
            consumer_id TEXT NOT NULL,
            pid         INTEGER NOT NULL,
            ts          TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}
