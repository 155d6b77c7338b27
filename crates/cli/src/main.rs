//! hiveguard CLI
//!
//! Process entry points for the agent runtime: a supervisor that spawns and
//! restarts worker processes, the worker loop itself, the projection
//! materializer, the governance engine, and the deterministic replay
//! harness.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// hiveguard — a multi-process autonomous-agent runtime.
#[derive(Parser, Debug)]
#[command(name = "hiveguard", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Supervise a fleet of worker processes.
    RunSupervisor(commands::run_supervisor::RunSupervisorArgs),
    /// Run a single worker's claim/dispatch loop. Normally spawned by
    /// `run-supervisor`, not invoked directly.
    RunWorker(commands::run_worker::RunWorkerArgs),
    /// Materialize the read-model projection view from the MailStore.
    RunProjector(commands::run_projector::RunProjectorArgs),
    /// Ingest projection deltas into the governance engine.
    RunGovernance(commands::run_governance::RunGovernanceArgs),
    /// Run the deterministic replay harness.
    RunReplay(commands::run_replay::RunReplayArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::RunSupervisor(args) => commands::run_supervisor::run(args).await,
        Command::RunWorker(args) => commands::run_worker::run(args).await,
        Command::RunProjector(args) => commands::run_projector::run(args).await,
        Command::RunGovernance(args) => commands::run_governance::run(args).await,
        Command::RunReplay(args) => commands::run_replay::run(args).await,
    };

    if let Err(ref err) = result {
        tracing::error!(error = %err, "command failed");
    }
    result
}
