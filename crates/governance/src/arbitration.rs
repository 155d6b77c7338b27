use hiveguard_core::{clamp01, GovernanceRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One voter's raw ballot targeting some agent (spec.md §4.8 "Boardroom
/// arbitration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub voter: String,
    pub reasoning_score: f64,
}

/// A single voter's contribution to the aggregate decision score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDetail {
    pub voter: String,
    pub reasoning_score: f64,
    pub authority_level: f64,
    pub trust_weight: f64,
    pub decision_score: f64,
}

/// The result of one boardroom arbitration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationOutcome {
    pub target: String,
    pub aggregate: f64,
    pub approved: bool,
    pub votes: Vec<VoteDetail>,
}

/// Pure function: `decision_score = clamp(reasoning,0,1) * authority(voter) *
/// trust(voter -> target)`; aggregate is the arithmetic mean; approved iff
/// aggregate >= threshold. Ballots from voters unknown to the registry are
/// ignored.
#[must_use]
pub fn arbitrate(registry: &GovernanceRegistry, target: &str, ballots: &[Ballot], threshold: f64) -> ArbitrationOutcome {
    let mut votes = Vec::new();
    for ballot in ballots {
        let Some(voter_profile) = registry.agents.get(&ballot.voter) else {
            continue;
        };
        let reasoning = clamp01(ballot.reasoning_score);
        let authority_level = voter_profile.authority_level;
        let trust_weight = voter_profile.trust_weights.get(target).copied().unwrap_or(1.0);
        let decision_score = reasoning * authority_level * trust_weight;
        votes.push(VoteDetail {
            voter: ballot.voter.clone(),
            reasoning_score: reasoning,
            authority_level,
            trust_weight,
            decision_score,
        });
    }

    let aggregate = if votes.is_empty() {
        0.0
    } else {
        votes.iter().map(|v| v.decision_score).sum::<f64>() / votes.len() as f64
    };

    ArbitrationOutcome {
        target: target.to_owned(),
        aggregate,
        approved: aggregate >= threshold,
        votes,
    }
}

impl ArbitrationOutcome {
    #[must_use]
    pub fn to_ledger_payload(&self) -> Value {
        json!({
            "target": self.target,
            "aggregate": self.aggregate,
            "approved": self.approved,
            "votes": self.votes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_authorities() -> GovernanceRegistry {
        let mut reg = GovernanceRegistry::new();
        for (id, authority) in [("supervisor", 1.0), ("command", 0.9), ("recon", 0.7), ("forge", 0.6)] {
            reg.ensure_agent(id, "agent").authority_level = authority;
        }
        reg
    }

    #[test]
    fn arbitration_is_deterministic_across_calls() {
        let registry = registry_with_authorities();
        let ballots = vec![
            Ballot { voter: "supervisor".into(), reasoning_score: 0.9 },
            Ballot { voter: "command".into(), reasoning_score: 1.2 },
            Ballot { voter: "recon".into(), reasoning_score: -0.3 },
            Ballot { voter: "forge".into(), reasoning_score: 0.6 },
        ];

        let first = arbitrate(&registry, "command", &ballots, 0.35);
        let second = arbitrate(&registry, "command", &ballots, 0.35);
        assert_eq!(first.aggregate, second.aggregate);
        assert_eq!(first.approved, second.approved);
    }

    #[test]
    fn reasoning_scores_are_clamped() {
        let registry = registry_with_authorities();
        let ballots = vec![Ballot { voter: "command".into(), reasoning_score: 1.2 }];
        let outcome = arbitrate(&registry, "command", &ballots, 0.35);
        assert_eq!(outcome.votes[0].reasoning_score, 1.0);
    }

    #[test]
    fn unknown_voters_are_ignored() {
        let registry = registry_with_authorities();
        let ballots = vec![Ballot { voter: "ghost".into(), reasoning_score: 1.0 }];
        let outcome = arbitrate(&registry, "command", &ballots, 0.35);
        assert!(outcome.votes.is_empty());
        assert_eq!(outcome.aggregate, 0.0);
    }
}
