use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clamp a score into the closed unit interval.
#[must_use]
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// One agent's standing within the governance registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub role: String,
    pub authority_level: f64,
    pub reputation_score: f64,
    pub trust_weights: HashMap<String, f64>,
    pub knowledge_lessons: Vec<String>,
}

/// A single historical reputation sample, retained for the stability metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistorySample {
    pub ts: DateTime<Utc>,
    pub score: f64,
}

/// The Governance Engine's durable view of every agent's authority, trust,
/// and reputation (spec.md §5).
///
/// `agents` is a [`BTreeMap`] rather than a [`HashMap`] so that iterating it
/// — for canonical hashing or deterministic replay comparison — always
/// visits agent ids in the same, sorted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceRegistry {
    pub schema_version: u32,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
    pub agents: BTreeMap<String, AgentProfile>,
    pub history: BTreeMap<String, Vec<HistorySample>>,
}

impl GovernanceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: 1,
            version: 0,
            last_updated: Utc::now(),
            agents: BTreeMap::new(),
            history: BTreeMap::new(),
        }
    }

    /// Register an agent if absent, leaving an existing profile untouched.
    pub fn ensure_agent(&mut self, agent_id: &str, role: &str) -> &mut AgentProfile {
        self.agents
            .entry(agent_id.to_owned())
            .or_insert_with(|| AgentProfile {
                role: role.to_owned(),
                authority_level: 0.5,
                reputation_score: 0.5,
                trust_weights: HashMap::new(),
                knowledge_lessons: Vec::new(),
            })
    }

    /// Record a reputation sample for `agent_id` and bump the registry
    /// version. Callers are responsible for trimming `history` if they care
    /// about unbounded growth; spec.md places no cap on retention.
    pub fn record_history(&mut self, agent_id: &str, ts: DateTime<Utc>, score: f64) {
        self.history
            .entry(agent_id.to_owned())
            .or_default()
            .push(HistorySample { ts, score });
        self.version += 1;
        self.last_updated = ts;
    }
}

impl Default for GovernanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp01_bounds_values() {
        assert_eq!(clamp01(-1.0), 0.0);
        assert_eq!(clamp01(2.0), 1.0);
        assert_eq!(clamp01(0.3), 0.3);
    }

    #[test]
    fn ensure_agent_is_idempotent() {
        let mut reg = GovernanceRegistry::new();
        reg.ensure_agent("recon", "scout").authority_level = 0.9;
        reg.ensure_agent("recon", "scout");
        assert_eq!(reg.agents.len(), 1);
        assert_eq!(reg.agents["recon"].authority_level, 0.9);
    }

    #[test]
    fn agents_iterate_in_sorted_order() {
        let mut reg = GovernanceRegistry::new();
        reg.ensure_agent("recon", "scout");
        reg.ensure_agent("command", "lead");
        reg.ensure_agent("forge", "builder");
        let ids: Vec<&String> = reg.agents.keys().collect();
        assert_eq!(ids, vec!["command", "forge", "recon"]);
    }

    #[test]
    fn record_history_bumps_version() {
        let mut reg = GovernanceRegistry::new();
        let before = reg.version;
        reg.record_history("recon", Utc::now(), 0.6);
        assert_eq!(reg.version, before + 1);
        assert_eq!(reg.history["recon"].len(), 1);
    }
}
