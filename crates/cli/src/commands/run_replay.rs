use std::path::PathBuf;

use clap::Args;
use hiveguard_core::ProjectionView;
use hiveguard_governance::{run_replay, AgentSeed, GovernanceConfig, GovernanceEngine};
use tracing::info;

#[derive(Args, Debug)]
pub struct RunReplayArgs {
    /// JSON file with agent seeds: an array of `[agent_id, role, authority_level]`.
    #[arg(long)]
    definitions: PathBuf,

    /// JSON file with the ordered projection-view sequence to replay.
    #[arg(long)]
    views: PathBuf,

    /// Where to persist the authoritative registry once determinism is confirmed.
    #[arg(long)]
    registry: PathBuf,

    /// Where to persist the authoritative ledger once determinism is confirmed.
    #[arg(long)]
    ledger: PathBuf,
}

pub async fn run(args: RunReplayArgs) -> anyhow::Result<()> {
    let seed: Vec<AgentSeed> = serde_json::from_slice(&std::fs::read(&args.definitions)?)?;
    let views: Vec<ProjectionView> = serde_json::from_slice(&std::fs::read(&args.views)?)?;
    let config = GovernanceConfig::default();

    let report = run_replay(&seed, &views, &config)?;
    info!(
        runs_agree = report.runs_agree,
        run_a_chain_valid = report.run_a_chain_valid,
        run_b_chain_valid = report.run_b_chain_valid,
        final_registry_hash = %report.final_registry_hash,
        "replay harness complete"
    );

    if !report.is_fully_deterministic() {
        anyhow::bail!("replay harness detected non-deterministic governance behavior");
    }

    let mut engine = GovernanceEngine::open(&args.registry, &args.ledger, config)?;
    for (agent_id, role, authority) in &seed {
        engine.registry_mut().ensure_agent(agent_id, role).authority_level = *authority;
    }
    let mut previous = ProjectionView::default();
    for current in &views {
        engine.ingest(&previous, current)?;
        previous = current.clone();
    }
    engine.persist_registry(&args.registry)?;

    if !engine.chain_valid() {
        anyhow::bail!("authoritative replay ledger chain is invalid");
    }
    Ok(())
}
