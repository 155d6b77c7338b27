use hiveguard_core::ProjectionView;

use crate::config::GovernanceConfig;
use crate::engine::GovernanceEngine;
use crate::error::GovernanceError;

/// An agent seeded into the registry before replay begins, e.g.
/// `("supervisor", "lead", 1.0)`.
pub type AgentSeed = (String, String, f64);

/// Result of the deterministic replay harness (spec.md §4.9).
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub run_a_chain_valid: bool,
    pub run_b_chain_valid: bool,
    pub run_a_hash_matches_reconstructed: bool,
    pub run_b_hash_matches_reconstructed: bool,
    pub runs_agree: bool,
    pub final_registry_hash: String,
}

impl ReplayReport {
    #[must_use]
    pub fn is_fully_deterministic(&self) -> bool {
        self.run_a_chain_valid
            && self.run_b_chain_valid
            && self.run_a_hash_matches_reconstructed
            && self.run_b_hash_matches_reconstructed
            && self.runs_agree
    }
}

fn run_once(seed: &[AgentSeed], views: &[ProjectionView], config: &GovernanceConfig) -> Result<(String, bool, bool), GovernanceError> {
    let dir = tempfile::tempdir().map_err(|source| GovernanceError::Io {
        path: std::env::temp_dir(),
        source,
    })?;
    let mut engine = GovernanceEngine::open(dir.path().join("registry.json"), dir.path().join("ledger.jsonl"), config.clone())?;
    for (agent_id, role, authority) in seed {
        engine.registry_mut().ensure_agent(agent_id, role).authority_level = *authority;
    }

    let mut previous = ProjectionView::default();
    for current in views {
        engine.ingest(&previous, current)?;
        previous = current.clone();
    }

    let chain_valid = engine.chain_valid();
    let reconstructed = crate::reconstruct::reconstruct_registry(&hiveguard_core::GovernanceRegistry::new(), engine.ledger().entries())?;
    let reconstructed_hash = hiveguard_core::canonical_sha256_hex(&serde_json::to_value(&reconstructed)?);
    let live_hash = engine.registry_hash();
    let hash_matches = reconstructed_hash == live_hash;
    Ok((live_hash, chain_valid, hash_matches))
}

/// Run the governance engine twice from the same seed and the same ordered
/// projection-view sequence, each in its own temp directory, and compare.
pub fn run_replay(seed: &[AgentSeed], views: &[ProjectionView], config: &GovernanceConfig) -> Result<ReplayReport, GovernanceError> {
    let (hash_a, valid_a, matches_a) = run_once(seed, views, config)?;
    let (hash_b, valid_b, matches_b) = run_once(seed, views, config)?;

    Ok(ReplayReport {
        run_a_chain_valid: valid_a,
        run_b_chain_valid: valid_b,
        run_a_hash_matches_reconstructed: matches_a,
        run_b_hash_matches_reconstructed: matches_b,
        runs_agree: hash_a == hash_b,
        final_registry_hash: hash_a,
    })
}
