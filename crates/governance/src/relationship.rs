use chrono::{DateTime, Utc};
use hiveguard_core::{clamp01, GovernanceRegistry};
use serde_json::{json, Value};

use crate::config::GovernanceConfig;
use crate::outcomes::{Outcome, OutcomeEvent};

/// Authority-band multiplier (spec.md §4.8 step 2): HIGH ≥ 0.8 → 1.2,
/// MEDIUM ≥ 0.5 → 1.0, LOW → 0.8.
#[must_use]
pub fn authority_band(authority_level: f64) -> f64 {
    if authority_level >= 0.8 {
        1.2
    } else if authority_level >= 0.5 {
        1.0
    } else {
        0.8
    }
}

/// Apply one outcome to the registry, returning the `TRUST_CHANGE` ledger
/// payload (absolute post-update values, so ledger replay never has to
/// recompute floating-point deltas).
pub fn apply_outcome(registry: &mut GovernanceRegistry, outcome: &OutcomeEvent, cfg: &GovernanceConfig, now: DateTime<Utc>) -> Value {
    registry.ensure_agent(&outcome.agent_id, "agent");
    let subject_authority = registry.agents[&outcome.agent_id].authority_level;
    let subject_band = authority_band(subject_authority);

    let delta = match outcome.outcome {
        Outcome::Success => cfg.success_step * subject_band,
        Outcome::Failure => {
            let penalty = if outcome.escalated { cfg.escalation_penalty } else { 0.0 };
            -(cfg.failure_step + penalty) * subject_band
        }
    };

    let new_score = {
        let subject = registry.agents.get_mut(&outcome.agent_id).expect("just ensured");
        subject.reputation_score = clamp01(subject.reputation_score + delta);
        subject.reputation_score
    };
    registry.record_history(&outcome.agent_id, now, new_score);

    let observer_ids: Vec<String> = registry.agents.keys().cloned().collect();
    let mut observer_trust = serde_json::Map::new();
    for observer_id in observer_ids {
        if observer_id == outcome.agent_id {
            continue;
        }
        let observer_band = authority_band(registry.agents[&observer_id].authority_level);
        let observer_delta = delta * observer_band;
        let new_weight = {
            let observer = registry.agents.get_mut(&observer_id).expect("iterating existing keys");
            let weight = observer.trust_weights.entry(outcome.agent_id.clone()).or_insert(0.5);
            *weight = clamp01(*weight + observer_delta);
            *weight
        };
        observer_trust.insert(observer_id, json!(new_weight));
    }

    json!({
        "agent_id": outcome.agent_id,
        "outcome": match outcome.outcome { Outcome::Success => "SUCCESS", Outcome::Failure => "FAILURE" },
        "escalated": outcome.escalated,
        "source_event_id": outcome.source_event_id,
        "source_event_type": outcome.source_event_type,
        "delta": delta,
        "reputation_score": new_score,
        "observer_trust": observer_trust,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_band_thresholds() {
        assert_eq!(authority_band(0.9), 1.2);
        assert_eq!(authority_band(0.8), 1.2);
        assert_eq!(authority_band(0.6), 1.0);
        assert_eq!(authority_band(0.5), 1.0);
        assert_eq!(authority_band(0.1), 0.8);
    }

    #[test]
    fn success_outcome_raises_reputation() {
        let mut registry = GovernanceRegistry::new();
        registry.ensure_agent("recon", "scout").authority_level = 0.9;
        registry.ensure_agent("command", "lead").authority_level = 0.9;
        let before = registry.agents["recon"].reputation_score;

        let outcome = OutcomeEvent {
            agent_id: "recon".to_owned(),
            outcome: Outcome::Success,
            escalated: false,
            source_event_id: 1,
            source_event_type: "WORKER_STARTED".to_owned(),
        };
        apply_outcome(&mut registry, &outcome, &GovernanceConfig::default(), Utc::now());
        assert!(registry.agents["recon"].reputation_score > before);
        assert_eq!(registry.history["recon"].len(), 1);
    }

    #[test]
    fn escalated_failure_applies_larger_penalty_than_plain_failure() {
        let cfg = GovernanceConfig::default();
        let now = Utc::now();

        let mut plain = GovernanceRegistry::new();
        plain.ensure_agent("recon", "scout");
        let plain_outcome = OutcomeEvent {
            agent_id: "recon".to_owned(),
            outcome: Outcome::Failure,
            escalated: false,
            source_event_id: 1,
            source_event_type: "WORKER_EXITED".to_owned(),
        };
        apply_outcome(&mut plain, &plain_outcome, &cfg, now);

        let mut escalated = GovernanceRegistry::new();
        escalated.ensure_agent("recon", "scout");
        let escalated_outcome = OutcomeEvent {
            agent_id: "recon".to_owned(),
            outcome: Outcome::Failure,
            escalated: true,
            source_event_id: 1,
            source_event_type: "WORKER_HEARTBEAT_MISSED".to_owned(),
        };
        apply_outcome(&mut escalated, &escalated_outcome, &cfg, now);

        assert!(escalated.agents["recon"].reputation_score < plain.agents["recon"].reputation_score);
    }
}
