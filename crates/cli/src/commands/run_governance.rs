use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use hiveguard_core::ProjectionView;
use hiveguard_governance::{GovernanceConfig, GovernanceEngine};
use hiveguard_projector::load_view;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunGovernanceArgs {
    /// Projection view file to ingest deltas from.
    #[arg(long)]
    view: PathBuf,

    /// Governance registry file (JSON, atomic replace).
    #[arg(long)]
    registry: PathBuf,

    /// Append-only audit ledger file (JSON-lines).
    #[arg(long)]
    ledger: PathBuf,

    /// Keep polling `view` for further changes instead of ingesting once
    /// and exiting.
    #[arg(long)]
    watch: bool,

    /// Seconds between polls when `--watch` is set.
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,
}

/// Cursor recording the last projection view this engine ingested, so a
/// fresh invocation picks up exactly where the previous one left off.
fn cursor_path(registry_path: &std::path::Path) -> PathBuf {
    registry_path.with_extension("prev-view.json")
}

fn load_previous(registry_path: &std::path::Path) -> anyhow::Result<ProjectionView> {
    let path = cursor_path(registry_path);
    match std::fs::read(&path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ProjectionView::default()),
        Err(err) => Err(err.into()),
    }
}

fn save_previous(registry_path: &std::path::Path, view: &ProjectionView) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(view)?;
    std::fs::write(cursor_path(registry_path), bytes)?;
    Ok(())
}

pub async fn run(args: RunGovernanceArgs) -> anyhow::Result<()> {
    let mut engine = GovernanceEngine::open(&args.registry, &args.ledger, GovernanceConfig::default())?;
    let mut previous = load_previous(&args.registry)?;

    ingest_if_changed(&mut engine, &mut previous, &args).await?;

    if args.watch {
        let poll_interval = Duration::from_secs(args.poll_interval);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                () = tokio::time::sleep(poll_interval) => {
                    ingest_if_changed(&mut engine, &mut previous, &args).await?;
                }
            }
        }
    }

    if !engine.chain_valid() {
        anyhow::bail!("governance ledger chain is invalid");
    }
    Ok(())
}

async fn ingest_if_changed(engine: &mut GovernanceEngine, previous: &mut ProjectionView, args: &RunGovernanceArgs) -> anyhow::Result<()> {
    let current = load_view(&args.view)?;
    if current.last_seen_event_id == previous.last_seen_event_id {
        return Ok(());
    }

    let report = engine.ingest(previous, &current)?;
    engine.persist_registry(&args.registry)?;
    save_previous(&args.registry, &current)?;
    info!(
        outcomes_applied = report.outcomes_applied,
        lesson_emitted = report.lesson_emitted,
        stability = report.stability,
        registry_version = report.registry_version,
        chain_valid = report.chain_valid,
        "governance ingest cycle complete"
    );
    if !report.chain_valid {
        anyhow::bail!("governance ledger chain is invalid");
    }
    *previous = current;
    Ok(())
}
