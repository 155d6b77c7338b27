use hiveguard_core::{canonical_sha256_hex, GovernanceRegistry, OfficeMode, ProjectionView};
use serde_json::json;

use crate::config::GovernanceConfig;

/// The outcome of one water-cooler propagation attempt (spec.md §4.8 step 3).
#[derive(Debug, Clone)]
pub struct LessonRecord {
    pub lesson_id: String,
    pub source_agent: String,
    pub recipients: Vec<String>,
    pub propagation_metric: f64,
}

/// Emit a deterministic water-cooler lesson if the office is idle and a new
/// event is present, unless that lesson id is already known to its
/// recipients (S4: a repeated identical call is a no-op).
pub fn maybe_propagate(registry: &mut GovernanceRegistry, current: &ProjectionView, cfg: &GovernanceConfig) -> Option<LessonRecord> {
    if current.derived.office_mode != OfficeMode::Paused || current.derived.stress_level > cfg.idle_threshold {
        return None;
    }
    let event = current.current_event.as_ref()?;
    let source_agent = event.origin_id.clone();

    let mut recipients: Vec<String> = registry
        .agents
        .keys()
        .filter(|id| **id != source_agent)
        .take(3)
        .cloned()
        .collect();
    recipients.sort();
    if recipients.is_empty() {
        return None;
    }

    let hashable = json!({
        "source_event_id": event.id,
        "source_event_type": event.event_type,
        "source_agent": source_agent,
        "registry_version": registry.version,
        "recipients": recipients,
    });
    let lesson_id = canonical_sha256_hex(&hashable);

    let already_known = recipients
        .iter()
        .all(|r| registry.agents.get(r).is_some_and(|a| a.knowledge_lessons.contains(&lesson_id)));
    if already_known {
        return None;
    }

    for recipient in &recipients {
        if let Some(profile) = registry.agents.get_mut(recipient) {
            if !profile.knowledge_lessons.contains(&lesson_id) {
                profile.knowledge_lessons.push(lesson_id.clone());
                profile.knowledge_lessons.sort();
                profile.knowledge_lessons.dedup();
            }
        }
    }

    let total_agents = registry.agents.len().max(1);
    let propagation_metric = recipients.len() as f64 / total_agents as f64;

    Some(LessonRecord {
        lesson_id,
        source_agent,
        recipients,
        propagation_metric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveguard_core::{Derived, Event, EventStatus};
    use serde_json::Map;

    fn idle_view(origin_id: &str, event_id: i64) -> ProjectionView {
        let mut view = ProjectionView::default();
        view.derived = Derived {
            office_mode: OfficeMode::Paused,
            stress_level: 0.1,
        };
        view.current_event = Some(Event {
            id: event_id,
            timestamp: chrono::Utc::now(),
            event_type: "SUPERVISOR_STOP".to_owned(),
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

    fn populated_registry() -> GovernanceRegistry {
        let mut reg = GovernanceRegistry::new();
        for id in ["supervisor", "command", "recon", "forge"] {
            reg.ensure_agent(id, "agent");
        }
        reg
    }

    #[test]
    fn idle_trigger_emits_exactly_one_lesson() {
        let mut registry = populated_registry();
        let view = idle_view("supervisor", 1);
        let lesson = maybe_propagate(&mut registry, &view, &GovernanceConfig::default());
        assert!(lesson.is_some());
        let lesson = lesson.unwrap();
        assert_eq!(lesson.recipients.len(), 3);
        assert!(!lesson.recipients.contains(&"supervisor".to_owned()));
    }

    #[test]
    fn repeated_identical_call_produces_no_new_lesson() {
        let mut registry = populated_registry();
        let view = idle_view("supervisor", 1);
        maybe_propagate(&mut registry, &view, &GovernanceConfig::default()).unwrap();

        let second = maybe_propagate(&mut registry, &view, &GovernanceConfig::default());
        assert!(second.is_none());
    }

    #[test]
    fn running_office_never_propagates() {
        let mut registry = populated_registry();
        let mut view = idle_view("supervisor", 1);
        view.derived.office_mode = OfficeMode::Running;
        assert!(maybe_propagate(&mut registry, &view, &GovernanceConfig::default()).is_none());
    }
}
