use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use hiveguard_bus::EventBus;
use hiveguard_core::{Event, NewEvent};
use hiveguard_gateway::{ActionRequest, ActionType, ToolGateway};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::handler::DomainHandler;

/// One agent's claim → dispatch → ack/fail loop (spec.md §4.6). Runs
/// single-threaded and cooperative; the only cross-process interaction is
/// through the [`EventBus`].
pub struct Worker {
    agent_id: String,
    consumer_id: String,
    bus: Arc<EventBus>,
    gateway: Option<Arc<ToolGateway>>,
    handlers: HashMap<String, Box<dyn DomainHandler>>,
    config: WorkerConfig,
}

impl Worker {
    #[must_use]
    pub fn new(agent_id: impl Into<String>, bus: Arc<EventBus>, config: WorkerConfig) -> Self {
        let agent_id = agent_id.into();
        let consumer_id = format!("worker:{agent_id}:{}", Utc::now().timestamp_millis());
        Self {
            agent_id,
            consumer_id,
            bus,
            gateway: None,
            handlers: HashMap::new(),
            config,
        }
    }

    /// Forward `TOOL_REQUEST` events to this gateway instead of ignoring them.
    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<ToolGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Register a handler for one domain-specific event type.
    pub fn register_handler(&mut self, event_type: impl Into<String>, handler: impl DomainHandler + 'static) {
        self.handlers.insert(event_type.into(), Box::new(handler));
    }

    #[must_use]
    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    /// Publish a heartbeat if `heartbeat_interval` has elapsed since `last`,
    /// returning the new `last` value.
    pub async fn heartbeat_if_due(&self, last: Option<chrono::DateTime<Utc>>) -> Result<Option<chrono::DateTime<Utc>>, WorkerError> {
        let now = Utc::now();
        let due = last.is_none_or(|t| (now - t).to_std().unwrap_or_default() >= self.config.heartbeat_interval);
        if !due {
            return Ok(last);
        }
        self.bus
            .store()
            .record_worker_heartbeat(&self.agent_id, &self.consumer_id, std::process::id().into(), now)
            .await
            .map_err(hiveguard_bus::BusError::from)?;
        Ok(Some(now))
    }

    /// Claim one event (if any is available within `claim_timeout`) and
    /// dispatch it, acking or failing as appropriate. Returns `true` if an
    /// event was processed.
    pub async fn run_once(&self) -> Result<bool, WorkerError> {
        let event = self
            .bus
            .claim_next_event(
                &self.consumer_id,
                self.config.claim_timeout,
                Some(&self.agent_id),
                self.config.include_unrouted,
                self.config.lease_seconds,
            )
            .await?;

        let Some(event) = event else {
            return Ok(false);
        };

        match self.dispatch(&event).await {
            Ok(()) => {
                self.bus.ack(event.id, &self.consumer_id).await?;
            }
            Err(err) => {
                warn!(agent_id = %self.agent_id, event_id = event.id, error = %err, "event dispatch failed");
                self.bus.fail(event.id, &err.to_string(), &self.consumer_id).await?;
            }
        }
        Ok(true)
    }

    /// Run the claim/dispatch loop until `stop` resolves.
    pub async fn run(&self, stop: impl std::future::Future<Output = ()>) -> Result<(), WorkerError> {
        tokio::pin!(stop);
        let mut last_heartbeat = None;
        loop {
            last_heartbeat = self.heartbeat_if_due(last_heartbeat).await?;
            tokio::select! {
                () = &mut stop => {
                    info!(agent_id = %self.agent_id, "worker stopping");
                    return Ok(());
                }
                result = self.run_once() => {
                    if !result? {
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, event: &Event) -> Result<(), WorkerError> {
        match event.event_type.as_str() {
            "SUPERVISOR_HEARTBEAT" => {
                debug!(agent_id = %self.agent_id, "liveness touch");
                Ok(())
            }
            "TOOL_REQUEST" => self.dispatch_tool_request(event).await,
            other => {
                let Some(handler) = self.handlers.get(other) else {
                    debug!(agent_id = %self.agent_id, event_type = other, "no handler registered, skipping");
                    return Ok(());
                };
                handler
                    .handle(event)
                    .await
                    .map_err(|e| WorkerError::Handler(other.to_owned(), e))
            }
        }
    }

    async fn dispatch_tool_request(&self, event: &Event) -> Result<(), WorkerError> {
        let Some(gateway) = &self.gateway else {
            return Err(WorkerError::Handler(
                "TOOL_REQUEST".to_owned(),
                "no tool gateway configured for this worker".to_owned(),
            ));
        };

        let req = build_action_request(event);
        let result = gateway.execute(req).await?;

        let mut payload = Map::new();
        payload.insert("allowed".into(), Value::Bool(result.allowed));
        payload.insert("reason".into(), Value::String(result.reason.clone()));
        if let Some(code) = result.return_code {
            payload.insert("return_code".into(), Value::from(code));
        }
        payload.insert("result".into(), Value::Object(result.result.clone()));

        let mut draft = NewEvent::new("TOOL_RESULT", &self.agent_id)
            .with_target_agent(event.origin_id.clone())
            .with_payload(payload);
        if let Some(correlation_id) = &event.correlation_id {
            draft = draft.with_correlation_id(correlation_id.clone());
        }
        self.bus.publish_event(draft).await?;
        Ok(())
    }
}

fn build_action_request(event: &Event) -> ActionRequest {
    let payload = &event.payload;
    let action_type = payload
        .get("action_type")
        .and_then(|v| v.as_str())
        .and_then(|s| serde_json::from_value::<ActionType>(Value::String(s.to_owned())).ok())
        .unwrap_or(ActionType::ReadFile);
    let working_dir = payload
        .get("working_dir")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .unwrap_or_default();
    let inner_payload = match payload.get("payload") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let mut req = ActionRequest::new(event.origin_id.clone(), action_type, working_dir).with_payload(inner_payload);
    if let Some(authorized_by) = payload.get("authorized_by").and_then(|v| v.as_str()) {
        req = req.with_authorized_by(authorized_by);
    }
    if let Some(key) = payload.get("idempotency_key").and_then(|v| v.as_str()) {
        req = req.with_idempotency_key(key);
    }
    req.allow_duplicate = payload.get("allow_duplicate").and_then(Value::as_bool).unwrap_or(false);
    req.correlation_id = event.correlation_id.clone();
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveguard_core::EventStatus;
    use hiveguard_store::MailStore;

    fn bus() -> Arc<EventBus> {
        Arc::new(EventBus::new(MailStore::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn heartbeat_if_due_records_liveness() {
        let bus = bus();
        let worker = Worker::new("recon", bus.clone(), WorkerConfig::default());
        let last = worker.heartbeat_if_due(None).await.unwrap();
        assert!(last.is_some());

        let hb = bus.store().get_worker_heartbeat("recon").await.unwrap().unwrap();
        assert_eq!(hb.consumer_id, worker.consumer_id());
    }

    #[tokio::test]
    async fn supervisor_heartbeat_event_is_acked_without_handler() {
        let bus = bus();
        let worker = Worker::new("recon", bus.clone(), WorkerConfig::default());
        let draft = NewEvent::new("SUPERVISOR_HEARTBEAT", "supervisor").with_target_agent("recon");
        let id = bus.publish_event(draft).await.unwrap();

        let processed = worker.run_once().await.unwrap();
        assert!(processed);
        let event = bus.store().get_event(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Done);
    }

    #[tokio::test]
    async fn domain_event_is_dispatched_to_registered_handler() {
        let bus = bus();
        let mut worker = Worker::new("recon", bus.clone(), WorkerConfig::default());
        worker.register_handler("RECON_SCAN", |_event: &Event| -> Result<(), String> { Ok(()) });

        let id = bus
            .publish_event(NewEvent::new("RECON_SCAN", "command").with_target_agent("recon"))
            .await
            .unwrap();

        assert!(worker.run_once().await.unwrap());
        let event = bus.store().get_event(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Done);
    }

    #[tokio::test]
    async fn failing_handler_fails_the_event() {
        let bus = bus();
        let mut worker = Worker::new("recon", bus.clone(), WorkerConfig::default());
        worker.register_handler("RECON_SCAN", |_event: &Event| -> Result<(), String> {
            Err("boom".to_owned())
        });

        let id = bus
            .publish_event(NewEvent::new("RECON_SCAN", "command").with_target_agent("recon"))
            .await
            .unwrap();

        assert!(worker.run_once().await.unwrap());
        let event = bus.store().get_event(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Failed);
        assert!(event.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn tool_request_without_gateway_fails() {
        let bus = bus();
        let worker = Worker::new("recon", bus.clone(), WorkerConfig::default());
        let id = bus
            .publish_event(NewEvent::new("TOOL_REQUEST", "recon").with_target_agent("recon"))
            .await
            .unwrap();

        assert!(worker.run_once().await.unwrap());
        let event = bus.store().get_event(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Failed);
    }
}
