use std::path::{Path, PathBuf};

use hiveguard_core::{EventStatus, OfficeMode, ProjectionView, WorkerEntry, WorkerState};
use hiveguard_store::MailStore;
use tracing::debug;

use crate::error::ProjectorError;
use crate::io::{load_view, write_view_atomic};

const STRESS_QUEUE_CAP: f64 = 25.0;

/// Read-only follower materializing [`ProjectionView`] from a [`MailStore`]
/// (spec.md §4.7). Safe to crash between fetch and write: the next cycle
/// re-derives everything from the persisted cursors.
pub struct Materializer {
    store: MailStore,
    view_path: PathBuf,
}

impl Materializer {
    #[must_use]
    pub fn new(store: MailStore, view_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            view_path: view_path.into(),
        }
    }

    #[must_use]
    pub fn view_path(&self) -> &Path {
        &self.view_path
    }

    /// Run one materialization cycle and persist the result, returning the
    /// new view.
    pub async fn run_once(&self) -> Result<ProjectionView, ProjectorError> {
        let mut view = load_view(&self.view_path)?;

        let events = self.store.list_events(None).await?;
        let status_counts = self.store.status_counts().await?;
        view.event_queue_size = *status_counts.get(&EventStatus::Pending.to_string()).unwrap_or(&0) as u64;
        view.current_event = events.iter().max_by_key(|e| e.id).cloned();

        for event in events.iter().filter(|e| e.id > view.last_seen_event_id) {
            view.events_processed += 1;
            *view.event_type_counts.entry(event.event_type.clone()).or_insert(0) += 1;

            match event.event_type.as_str() {
                "SUPERVISOR_START" => view.running = true,
                "SUPERVISOR_STOP" => view.running = false,
                _ => {}
            }

            if let Some(worker_id) = event.resolve_worker_id() {
                let entry = view.workers.entry(worker_id).or_default();
                apply_worker_transition(entry, &event.event_type);
                entry.last_event_type = Some(event.event_type.clone());
                entry.last_event_at = Some(event.timestamp);
                entry.last_seen_event_id = Some(event.id);
            }

            view.last_seen_event_id = event.id;
        }

        let audit_rows = self.store.list_tool_audit(i64::MAX).await?;
        for row in audit_rows.iter().filter(|r| r.id > view.last_seen_tool_audit_id) {
            if row.allowed {
                view.tool_audit_counts.allowed += 1;
            } else {
                view.tool_audit_counts.denied += 1;
            }
            view.last_seen_tool_audit_id = row.id;
        }

        view.derived.office_mode = if view.running { OfficeMode::Running } else { OfficeMode::Paused };
        view.derived.stress_level = (view.event_queue_size as f64 / STRESS_QUEUE_CAP).min(1.0);
        view.last_updated_at = chrono::Utc::now();

        write_view_atomic(&self.view_path, &view)?;
        debug!(
            events_processed = view.events_processed,
            last_seen_event_id = view.last_seen_event_id,
            "materialized view"
        );
        Ok(view)
    }

    /// Run `run_once` on a fixed poll interval until `stop` resolves.
    pub async fn run(
        &self,
        poll_interval: std::time::Duration,
        stop: impl std::future::Future<Output = ()>,
    ) -> Result<(), ProjectorError> {
        tokio::pin!(stop);
        loop {
            self.run_once().await?;
            tokio::select! {
                () = &mut stop => return Ok(()),
                () = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
}

/// Worker state machine transitions, named event types only (spec.md §4.7).
fn apply_worker_transition(entry: &mut WorkerEntry, event_type: &str) {
    match event_type {
        "WORKER_STARTED" => {
            entry.present = true;
            entry.state = WorkerState::Active;
        }
        "WORKER_RESTART_SCHEDULED" => {
            entry.state = WorkerState::Restarting;
        }
        "WORKER_RESTARTED" => {
            entry.present = true;
            entry.state = WorkerState::Active;
            entry.restart_count += 1;
        }
        "WORKER_EXITED" => {
            entry.present = false;
            entry.state = WorkerState::Offline;
        }
        "WORKER_HEARTBEAT_MISSED" => {
            entry.missed_heartbeat_count += 1;
            if entry.missed_heartbeat_count >= 2 {
                entry.present = false;
                entry.state = WorkerState::Offline;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveguard_core::NewEvent;

    async fn materializer_with_view_path() -> (Materializer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = MailStore::open_in_memory().unwrap();
        let view_path = dir.path().join("view.json");
        (Materializer::new(store, view_path), dir)
    }

    #[tokio::test]
    async fn worker_lifecycle_matches_state_machine() {
        let (m, _dir) = materializer_with_view_path().await;
        for event_type in [
            "WORKER_STARTED",
            "WORKER_RESTART_SCHEDULED",
            "WORKER_RESTARTED",
            "WORKER_EXITED",
        ] {
            m.store
                .append_event(NewEvent::new(event_type, "supervisor").with_target_agent("recon"))
                .await
                .unwrap();
        }

        let v1 = m.run_once().await.unwrap();
        let recon = &v1.workers["recon"];
        assert_eq!(recon.state, WorkerState::Offline);
        assert!(!recon.present);
        assert_eq!(recon.restart_count, 1);
    }

    #[tokio::test]
    async fn running_flips_on_start_stop() {
        let (m, _dir) = materializer_with_view_path().await;
        m.store
            .append_event(NewEvent::new("SUPERVISOR_START", "supervisor"))
            .await
            .unwrap();
        let v1 = m.run_once().await.unwrap();
        assert!(v1.running);
        assert_eq!(v1.derived.office_mode, OfficeMode::Running);

        m.store
            .append_event(NewEvent::new("SUPERVISOR_STOP", "supervisor"))
            .await
            .unwrap();
        let v2 = m.run_once().await.unwrap();
        assert!(!v2.running);
        assert_eq!(v2.derived.office_mode, OfficeMode::Paused);
    }

    #[tokio::test]
    async fn cursor_advances_and_is_idempotent_across_runs() {
        let (m, _dir) = materializer_with_view_path().await;
        m.store
            .append_event(NewEvent::new("WORKER_STARTED", "supervisor").with_target_agent("recon"))
            .await
            .unwrap();
        let v1 = m.run_once().await.unwrap();
        assert_eq!(v1.events_processed, 1);

        let v2 = m.run_once().await.unwrap();
        assert_eq!(v2.events_processed, 1);
        assert_eq!(v2.last_seen_event_id, v1.last_seen_event_id);
    }

    #[tokio::test]
    async fn stress_level_tracks_queue_depth() {
        let (m, _dir) = materializer_with_view_path().await;
        for _ in 0..25 {
            m.store
                .append_event(NewEvent::new("DOMAIN_EVENT", "command"))
                .await
                .unwrap();
        }
        let view = m.run_once().await.unwrap();
        assert_eq!(view.event_queue_size, 25);
        assert!((view.derived.stress_level - 1.0).abs() < f64::EPSILON);
    }
}
