use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Lifecycle status of an [`Event`].
///
/// Once an event reaches `Done` or `Failed` no further transition is valid
/// except `requeue`, which sends it back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Pending,
    Claimed,
    Done,
    Failed,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Claimed => "CLAIMED",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// A not-yet-persisted event, as produced by a publisher.
///
/// `MailStore::append_event` assigns the monotonic `id`, `timestamp`, and
/// initial `status = Pending` to turn this into a durable [`Event`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub event_type: String,
    pub origin_id: String,
    #[serde(default)]
    pub target_agent: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub justification: Option<String>,
}

impl NewEvent {
    /// Create a new event draft with the two required fields.
    #[must_use]
    pub fn new(event_type: impl Into<String>, origin_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            origin_id: origin_id.into(),
            target_agent: None,
            correlation_id: None,
            payload: Map::new(),
            justification: None,
        }
    }

    #[must_use]
    pub fn with_target_agent(mut self, target: impl Into<String>) -> Self {
        self.target_agent = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    /// Validate required fields. Called by `MailStore::append_event` and by
    /// the Event Bus Adapter's coercer before any durable write.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.event_type.trim().is_empty() {
            return Err(CoreError::EmptyEventType);
        }
        if self.origin_id.trim().is_empty() {
            return Err(CoreError::EmptyOriginId);
        }
        Ok(())
    }

    /// Coerce an arbitrary mapping-like JSON value into a canonical
    /// [`NewEvent`], rejecting values missing `type`/`origin_id`.
    ///
    /// Accepts any object with at least `type` (or `event_type`) and
    /// `origin_id` string fields; all other recognized fields are optional.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let Value::Object(mut obj) = value else {
            return Err(CoreError::NotCoercible(
                "expected a JSON object".to_owned(),
            ));
        };

        let event_type = obj
            .remove("type")
            .or_else(|| obj.remove("event_type"))
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or(CoreError::EmptyEventType)?;

        let origin_id = obj
            .remove("origin_id")
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or(CoreError::EmptyOriginId)?;

        let target_agent = obj
            .remove("target_agent")
            .and_then(|v| v.as_str().map(str::to_owned));
        let correlation_id = obj
            .remove("correlation_id")
            .and_then(|v| v.as_str().map(str::to_owned));
        let justification = obj
            .remove("justification")
            .and_then(|v| v.as_str().map(str::to_owned));
        let payload = match obj.remove("payload") {
            Some(Value::Object(map)) => map,
            Some(_) | None => Map::new(),
        };

        let draft = Self {
            event_type,
            origin_id,
            target_agent,
            correlation_id,
            payload,
            justification,
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// A durable, canonically-shaped event in the MailStore.
///
/// `id` is assigned on append and strictly increases. Invariants (spec.md
/// §3): once `status` is `Done` or `Failed`, the only valid transition is
/// `requeue` back to `Pending`; at most one live lease exists per `Claimed`
/// event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub origin_id: String,
    pub target_agent: Option<String>,
    pub correlation_id: Option<String>,
    pub payload: Map<String, Value>,
    pub justification: Option<String>,
    pub status: EventStatus,
    pub error: Option<String>,
}

impl Event {
    /// Resolve a worker id this event concerns, per the projection's
    /// `target_agent | agent_id | worker` payload lookup order (spec.md §4.7).
    #[must_use]
    pub fn resolve_worker_id(&self) -> Option<String> {
        if let Some(target) = &self.target_agent {
            return Some(target.clone());
        }
        for key in ["agent_id", "worker", "target_agent"] {
            if let Some(v) = self.payload.get(key).and_then(|v| v.as_str()) {
                return Some(v.to_owned());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_validates_empty_type() {
        let draft = NewEvent::new("", "recon");
        assert!(matches!(draft.validate(), Err(CoreError::EmptyEventType)));
    }

    #[test]
    fn new_event_validates_empty_origin() {
        let draft = NewEvent::new("TOOL_REQUEST", "");
        assert!(matches!(draft.validate(), Err(CoreError::EmptyOriginId)));
    }

    #[test]
    fn new_event_builder_roundtrip() {
        let draft = NewEvent::new("TOOL_REQUEST", "forge")
            .with_target_agent("command")
            .with_correlation_id("corr-1")
            .with_justification("testing");
        assert_eq!(draft.target_agent.as_deref(), Some("command"));
        assert_eq!(draft.correlation_id.as_deref(), Some("corr-1"));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn from_value_coerces_minimal_object() {
        let v = serde_json::json!({"type": "WORKER_STARTED", "origin_id": "supervisor"});
        let draft = NewEvent::from_value(v).unwrap();
        assert_eq!(draft.event_type, "WORKER_STARTED");
        assert_eq!(draft.origin_id, "supervisor");
    }

    #[test]
    fn from_value_rejects_missing_type() {
        let v = serde_json::json!({"origin_id": "supervisor"});
        assert!(matches!(
            NewEvent::from_value(v),
            Err(CoreError::EmptyEventType)
        ));
    }

    #[test]
    fn from_value_rejects_missing_origin() {
        let v = serde_json::json!({"type": "WORKER_STARTED"});
        assert!(matches!(
            NewEvent::from_value(v),
            Err(CoreError::EmptyOriginId)
        ));
    }

    #[test]
    fn from_value_rejects_non_object() {
        let v = serde_json::json!("not an object");
        assert!(matches!(
            NewEvent::from_value(v),
            Err(CoreError::NotCoercible(_))
        ));
    }

    #[test]
    fn resolve_worker_id_prefers_target_agent() {
        let event = Event {
            id: 1,
            timestamp: Utc::now(),
            event_type: "WORKER_EXITED".into(),
            origin_id: "supervisor".into(),
            target_agent: Some("recon".into()),
            correlation_id: None,
            payload: Map::new(),
            justification: None,
            status: EventStatus::Done,
            error: None,
        };
        assert_eq!(event.resolve_worker_id().as_deref(), Some("recon"));
    }

    #[test]
    fn resolve_worker_id_falls_back_to_payload() {
        let mut payload = Map::new();
        payload.insert("agent_id".into(), Value::String("forge".into()));
        let event = Event {
            id: 1,
            timestamp: Utc::now(),
            event_type: "WORKER_EXITED".into(),
            origin_id: "supervisor".into(),
            target_agent: None,
            correlation_id: None,
            payload,
            justification: None,
            status: EventStatus::Done,
            error: None,
        };
        assert_eq!(event.resolve_worker_id().as_deref(), Some("forge"));
    }

    #[test]
    fn event_status_display_matches_wire_form() {
        assert_eq!(EventStatus::Pending.to_string(), "PENDING");
        assert_eq!(EventStatus::Claimed.to_string(), "CLAIMED");
        assert_eq!(EventStatus::Done.to_string(), "DONE");
        assert_eq!(EventStatus::Failed.to_string(), "FAILED");
    }
}
