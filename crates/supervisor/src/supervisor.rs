use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use hiveguard_bus::EventBus;
use hiveguard_core::NewEvent;
use serde_json::{Map, Value};
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backoff::next_restart_delay;
use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::table::WorkerRecord;

type SpawnFn = dyn Fn(&str) -> std::io::Result<Child> + Send + Sync;

/// Spawns one worker process per agent, publishes heartbeats and control
/// events, and restarts workers under a bounded exponential-backoff policy
/// (spec.md §4.5).
pub struct Supervisor {
    bus: Arc<EventBus>,
    config: SupervisorConfig,
    spawn: Box<SpawnFn>,
    workers: Mutex<HashMap<String, WorkerRecord>>,
}

impl Supervisor {
    pub fn new(
        bus: Arc<EventBus>,
        config: SupervisorConfig,
        spawn: impl Fn(&str) -> std::io::Result<Child> + Send + Sync + 'static,
    ) -> Self {
        Self {
            bus,
            config,
            spawn: Box::new(spawn),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn every agent's worker process and emit `SUPERVISOR_START` plus
    /// one `WORKER_STARTED` per agent.
    pub async fn start(&self, agents: &[String]) -> Result<(), SupervisorError> {
        self.publish_control("SUPERVISOR_START", "supervisor:start", Map::new()).await?;
        let mut workers = self.workers.lock().await;
        for agent_id in agents {
            let child = (self.spawn)(agent_id).map_err(|source| SupervisorError::Spawn {
                agent_id: agent_id.clone(),
                source,
            })?;
            let consumer_id = format!("worker:{agent_id}:{}", Utc::now().timestamp_millis());
            workers.insert(agent_id.clone(), WorkerRecord::new(agent_id.clone(), consumer_id, child));
        }
        drop(workers);
        for agent_id in agents {
            self.publish_routed("WORKER_STARTED", agent_id, format!("worker-started:{agent_id}"), Map::new())
                .await?;
        }
        Ok(())
    }

    /// One supervisor poll cycle: liveness check, restart scheduling,
    /// scheduled respawns, and due heartbeats.
    pub async fn poll_once(&self) -> Result<(), SupervisorError> {
        self.check_liveness().await?;
        self.respawn_scheduled().await?;
        self.publish_heartbeats().await?;
        Ok(())
    }

    async fn check_liveness(&self) -> Result<(), SupervisorError> {
        let now = Utc::now();
        let down_agents: Vec<(String, String, Option<i32>)> = {
            let mut workers = self.workers.lock().await;
            let mut down = Vec::new();
            for (agent_id, record) in workers.iter_mut() {
                if record.disabled {
                    continue;
                }
                let process_exited = match record.child.as_mut() {
                    Some(child) => matches!(child.try_wait(), Ok(Some(_))),
                    None => false,
                };
                let heartbeat_stale = self
                    .bus
                    .store()
                    .get_worker_heartbeat(agent_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|hb| (now - hb.ts).num_seconds() > self.config.heartbeat_timeout_seconds as i64)
                    .unwrap_or(false);

                if process_exited {
                    let code = record
                        .child
                        .as_mut()
                        .and_then(|c| c.try_wait().ok().flatten())
                        .and_then(|s| s.code());
                    down.push((agent_id.clone(), "process_exit".to_owned(), code));
                } else if heartbeat_stale {
                    down.push((agent_id.clone(), "heartbeat_missed".to_owned(), None));
                }
            }
            down
        };

        for (agent_id, reason, exit_code) in down_agents {
            self.handle_worker_down(&agent_id, &reason, exit_code).await?;
        }
        Ok(())
    }

    async fn handle_worker_down(
        &self,
        agent_id: &str,
        reason: &str,
        exit_code: Option<i32>,
    ) -> Result<(), SupervisorError> {
        warn!(agent_id, reason, "worker down");
        {
            let mut workers = self.workers.lock().await;
            if let Some(record) = workers.get_mut(agent_id) {
                if let Some(child) = record.child.as_mut() {
                    let _ = child.start_kill();
                }
                record.child = None;
            }
        }

        let mut payload = Map::new();
        payload.insert("reason".into(), Value::String(reason.to_owned()));
        if let Some(code) = exit_code {
            payload.insert("exit_code".into(), Value::from(code));
        }
        self.publish_routed(
            "WORKER_EXITED",
            agent_id,
            format!("worker-exited:{agent_id}:{}", Utc::now().timestamp_millis()),
            payload,
        )
        .await?;

        self.restart_logic(agent_id).await
    }

    async fn restart_logic(&self, agent_id: &str) -> Result<(), SupervisorError> {
        let now = Utc::now();
        let decision = {
            let mut workers = self.workers.lock().await;
            let Some(record) = workers.get_mut(agent_id) else {
                return Err(SupervisorError::UnknownAgent(agent_id.to_owned()));
            };
            record.restart_count += 1;
            record.restart_history.push(now);
            record.prune_history(now, self.config.restart_window_seconds);

            if record.restart_history.len() as u32 > self.config.restart_window_limit
                || record.restart_count > self.config.max_restarts
            {
                record.disabled = true;
                None
            } else {
                let delay = next_restart_delay(self.config.backoff_base, self.config.backoff_cap, record.restart_count);
                let scheduled_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
                record.scheduled_restart_at = Some(scheduled_at);
                Some(scheduled_at)
            }
        };

        match decision {
            None => {
                self.publish_routed("WORKER_DISABLED", agent_id, format!("worker-disabled:{agent_id}"), Map::new())
                    .await?;
                let mut alert = Map::new();
                alert.insert("agent_id".into(), Value::String(agent_id.to_owned()));
                alert.insert(
                    "message".into(),
                    Value::String(format!("{agent_id} disabled after exceeding restart budget")),
                );
                self.publish_control("SUPERVISOR_ALERT", &format!("alert:{agent_id}"), alert).await?;
            }
            Some(scheduled_at) => {
                let mut payload = Map::new();
                payload.insert("scheduled_at".into(), Value::String(scheduled_at.to_rfc3339()));
                self.publish_routed(
                    "WORKER_RESTART_SCHEDULED",
                    agent_id,
                    format!("worker-restart-scheduled:{agent_id}:{}", scheduled_at.timestamp_millis()),
                    payload,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn respawn_scheduled(&self) -> Result<(), SupervisorError> {
        let now = Utc::now();
        let to_respawn: Vec<String> = {
            let workers = self.workers.lock().await;
            workers
                .iter()
                .filter(|(_, r)| !r.disabled && r.child.is_none() && r.scheduled_restart_at.is_some_and(|t| t <= now))
                .map(|(id, _)| id.clone())
                .collect()
        };

        for agent_id in to_respawn {
            let child = (self.spawn)(&agent_id).map_err(|source| SupervisorError::Spawn {
                agent_id: agent_id.clone(),
                source,
            })?;
            {
                let mut workers = self.workers.lock().await;
                if let Some(record) = workers.get_mut(&agent_id) {
                    record.child = Some(child);
                    record.scheduled_restart_at = None;
                    record.consumer_id = format!("worker:{agent_id}:{}", Utc::now().timestamp_millis());
                }
            }
            let mut payload = Map::new();
            payload.insert("restart_count".into(), Value::from(self.restart_count(&agent_id).await));
            self.publish_routed(
                "WORKER_RESTARTED",
                &agent_id,
                format!("worker-restarted:{agent_id}:{}", Utc::now().timestamp_millis()),
                payload,
            )
            .await?;
        }
        Ok(())
    }

    async fn restart_count(&self, agent_id: &str) -> u32 {
        self.workers.lock().await.get(agent_id).map_or(0, |r| r.restart_count)
    }

    async fn publish_heartbeats(&self) -> Result<(), SupervisorError> {
        let now = Utc::now();
        let due: Vec<String> = {
            let workers = self.workers.lock().await;
            workers
                .iter()
                .filter(|(_, r)| {
                    !r.disabled
                        && r.last_heartbeat_published
                            .is_none_or(|last| (now - last).num_seconds() >= self.config.heartbeat_interval_seconds as i64)
                })
                .map(|(id, _)| id.clone())
                .collect()
        };

        for agent_id in due {
            let cycle = now.timestamp() / i64::try_from(self.config.heartbeat_interval_seconds.max(1)).unwrap_or(1);
            self.publish_routed(
                "SUPERVISOR_HEARTBEAT",
                &agent_id,
                format!("heartbeat:{agent_id}:{cycle}"),
                Map::new(),
            )
            .await?;
            if let Some(record) = self.workers.lock().await.get_mut(&agent_id) {
                record.last_heartbeat_published = Some(now);
            }
        }
        Ok(())
    }

    /// Two-phase stop: terminate every live worker, emit `WORKER_EXITED`
    /// with `reason=stop` for each, then `SUPERVISOR_STOP`.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        info!("supervisor stopping");
        let agent_ids: Vec<String> = self.workers.lock().await.keys().cloned().collect();
        for agent_id in &agent_ids {
            let mut workers = self.workers.lock().await;
            if let Some(record) = workers.get_mut(agent_id) {
                if let Some(child) = record.child.as_mut() {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                record.child = None;
            }
            drop(workers);
            let mut payload = Map::new();
            payload.insert("reason".into(), Value::String("stop".to_owned()));
            self.publish_routed(
                "WORKER_EXITED",
                agent_id,
                format!("worker-exited-stop:{agent_id}"),
                payload,
            )
            .await?;
        }
        self.publish_control("SUPERVISOR_STOP", "supervisor:stop", Map::new()).await?;
        Ok(())
    }

    async fn publish_control(&self, event_type: &str, correlation_id: &str, payload: Map<String, Value>) -> Result<(), SupervisorError> {
        let key = format!("control:{correlation_id}");
        let reserved = self
            .bus
            .store()
            .reserve_idempotency_key(&key, "supervisor", event_type, None)
            .await?;
        if !reserved {
            return Ok(());
        }
        let draft = NewEvent::new(event_type, "supervisor")
            .with_correlation_id(correlation_id)
            .with_payload(payload);
        self.bus.publish_event(draft).await?;
        Ok(())
    }

    async fn publish_routed(
        &self,
        event_type: &str,
        target_agent: &str,
        correlation_id: String,
        payload: Map<String, Value>,
    ) -> Result<(), SupervisorError> {
        let key = format!("control:{correlation_id}");
        let reserved = self
            .bus
            .store()
            .reserve_idempotency_key(&key, "supervisor", event_type, None)
            .await?;
        if !reserved {
            return Ok(());
        }
        let draft = NewEvent::new(event_type, "supervisor")
            .with_target_agent(target_agent)
            .with_correlation_id(correlation_id)
            .with_payload(payload);
        self.bus.publish_event(draft).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveguard_store::MailStore;
    use std::time::Duration as StdDuration;
    use tokio::process::Command;

    fn test_config() -> SupervisorConfig {
        SupervisorConfig {
            heartbeat_interval_seconds: 1,
            heartbeat_timeout_seconds: 5,
            restart_window_seconds: 300,
            restart_window_limit: 2,
            max_restarts: 3,
            backoff_base: StdDuration::from_millis(1),
            backoff_cap: StdDuration::from_millis(10),
            lease_seconds: 30,
        }
    }

    fn long_lived_spawn(_agent_id: &str) -> std::io::Result<tokio::process::Child> {
        Command::new("sleep").arg("30").kill_on_drop(true).spawn()
    }

    fn short_lived_spawn(_agent_id: &str) -> std::io::Result<tokio::process::Child> {
        Command::new("true").kill_on_drop(true).spawn()
    }

    #[tokio::test]
    async fn start_spawns_workers_and_publishes_events() {
        let bus = Arc::new(EventBus::new(MailStore::open_in_memory().unwrap()));
        let sup = Supervisor::new(bus.clone(), test_config(), long_lived_spawn);
        sup.start(&["recon".to_owned()]).await.unwrap();

        let events = bus.store().list_events(None).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == "SUPERVISOR_START"));
        assert!(events
            .iter()
            .any(|e| e.event_type == "WORKER_STARTED" && e.target_agent.as_deref() == Some("recon")));
    }

    #[tokio::test]
    async fn control_event_is_published_once() {
        let bus = Arc::new(EventBus::new(MailStore::open_in_memory().unwrap()));
        let sup = Supervisor::new(bus.clone(), test_config(), long_lived_spawn);
        sup.publish_control("SUPERVISOR_START", "supervisor:start", Map::new())
            .await
            .unwrap();
        sup.publish_control("SUPERVISOR_START", "supervisor:start", Map::new())
            .await
            .unwrap();

        let events = bus.store().list_events(None).await.unwrap();
        let count = events.iter().filter(|e| e.event_type == "SUPERVISOR_START").count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn dead_process_triggers_restart_scheduling() {
        let bus = Arc::new(EventBus::new(MailStore::open_in_memory().unwrap()));
        let sup = Supervisor::new(bus.clone(), test_config(), short_lived_spawn);
        sup.start(&["recon".to_owned()]).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(200)).await;
        sup.poll_once().await.unwrap();

        let workers = sup.workers.lock().await;
        let record = workers.get("recon").unwrap();
        assert!(record.scheduled_restart_at.is_some() || record.disabled);
    }

    #[tokio::test]
    async fn exceeding_restart_budget_disables_worker() {
        let bus = Arc::new(EventBus::new(MailStore::open_in_memory().unwrap()));
        let sup = Supervisor::new(bus.clone(), test_config(), short_lived_spawn);
        sup.start(&["recon".to_owned()]).await.unwrap();

        for _ in 0..5 {
            sup.restart_logic("recon").await.unwrap();
        }

        let workers = sup.workers.lock().await;
        assert!(workers.get("recon").unwrap().disabled);

        let events = bus.store().list_events(None).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == "WORKER_DISABLED"));
        assert!(events.iter().any(|e| e.event_type == "SUPERVISOR_ALERT"));
    }
}
