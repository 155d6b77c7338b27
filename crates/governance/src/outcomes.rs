use hiveguard_core::ProjectionView;

const SUCCESS_TYPES: &[&str] = &["SUPERVISOR_START", "INTENT_DISPATCH", "WORKER_STARTED", "WORKER_RESTARTED"];
const FAILURE_TYPES: &[&str] = &[
    "SUPERVISOR_STOP",
    "PROPOSAL_INVALID",
    "WORKER_EXITED",
    "WORKER_HEARTBEAT_MISSED",
    "WORKER_RESTART_SCHEDULED",
];
const ESCALATION_TYPES: &[&str] = &["WORKER_HEARTBEAT_MISSED", "PROPOSAL_INVALID"];

/// Whether an outcome raised or lowered the subject's standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// One reputation-affecting fact derived from a projection-view delta
/// (spec.md §4.8 step 1).
#[derive(Debug, Clone)]
pub struct OutcomeEvent {
    pub agent_id: String,
    pub outcome: Outcome,
    pub escalated: bool,
    pub source_event_id: i64,
    pub source_event_type: String,
}

/// Classify a named event type, if it participates in outcome derivation.
fn classify(event_type: &str) -> Option<Outcome> {
    if SUCCESS_TYPES.contains(&event_type) {
        Some(Outcome::Success)
    } else if FAILURE_TYPES.contains(&event_type) {
        Some(Outcome::Failure)
    } else {
        None
    }
}

/// Resolve the agent a projection's `current_event` concerns: prefer a
/// payload-resolvable worker id, fall back to `origin_id`.
fn resolve_event_agent(view: &ProjectionView) -> Option<String> {
    let event = view.current_event.as_ref()?;
    event.resolve_worker_id().or_else(|| Some(event.origin_id.clone()))
}

/// Derive outcomes from the delta between two projection views.
pub fn derive_outcomes(previous: &ProjectionView, current: &ProjectionView) -> Vec<OutcomeEvent> {
    let mut outcomes = Vec::new();

    if current.last_seen_event_id > previous.last_seen_event_id {
        if let (Some(event), Some(agent_id)) = (&current.current_event, resolve_event_agent(current)) {
            if let Some(outcome) = classify(&event.event_type) {
                outcomes.push(OutcomeEvent {
                    agent_id,
                    outcome,
                    escalated: ESCALATION_TYPES.contains(&event.event_type.as_str()),
                    source_event_id: event.id,
                    source_event_type: event.event_type.clone(),
                });
            }
        }
    }

    if current.last_seen_tool_audit_id > previous.last_seen_tool_audit_id {
        let allowed_delta = current.tool_audit_counts.allowed.saturating_sub(previous.tool_audit_counts.allowed);
        let denied_delta = current.tool_audit_counts.denied.saturating_sub(previous.tool_audit_counts.denied);
        let active_agents: Vec<&String> = current
            .workers
            .iter()
            .filter(|(_, w)| w.present)
            .map(|(id, _)| id)
            .collect();

        for agent_id in &active_agents {
            if allowed_delta > 0 {
                outcomes.push(OutcomeEvent {
                    agent_id: (*agent_id).clone(),
                    outcome: Outcome::Success,
                    escalated: false,
                    source_event_id: current.last_seen_tool_audit_id,
                    source_event_type: "TOOL_AUDIT_ALLOWED".to_owned(),
                });
            }
            if denied_delta > 0 {
                outcomes.push(OutcomeEvent {
                    agent_id: (*agent_id).clone(),
                    outcome: Outcome::Failure,
                    escalated: false,
                    source_event_id: current.last_seen_tool_audit_id,
                    source_event_type: "TOOL_AUDIT_DENIED".to_owned(),
                });
            }
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveguard_core::{Event, EventStatus};
    use serde_json::Map;

    fn view_with_event(last_seen_event_id: i64, event_type: &str, origin_id: &str) -> ProjectionView {
        let mut view = ProjectionView::default();
        view.last_seen_event_id = last_seen_event_id;
        view.current_event = Some(Event {
            id: last_seen_event_id,
            timestamp: chrono::Utc::now(),
            event_type: event_type.to_owned(),
            origin_id: origin_id.to_owned(),
            target_agent: None,
            correlation_id: None,
            payload: Map::new(),
            justification: None,
            status: EventStatus::Done,
            error: None,
        });
        view
    }

    #[test]
    fn success_event_produces_success_outcome() {
        let previous = ProjectionView::default();
        let current = view_with_event(1, "WORKER_STARTED", "supervisor");
        let outcomes = derive_outcomes(&previous, &current);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].outcome, Outcome::Success);
        assert_eq!(outcomes[0].agent_id, "supervisor");
    }

    #[test]
    fn escalation_type_sets_escalated_flag() {
        let previous = ProjectionView::default();
        let current = view_with_event(1, "WORKER_HEARTBEAT_MISSED", "recon");
        let outcomes = derive_outcomes(&previous, &current);
        assert!(outcomes[0].escalated);
        assert_eq!(outcomes[0].outcome, Outcome::Failure);
    }

    #[test]
    fn unchanged_cursor_produces_no_outcomes() {
        let view = view_with_event(1, "WORKER_STARTED", "supervisor");
        let outcomes = derive_outcomes(&view, &view);
        assert!(outcomes.is_empty());
    }
}
