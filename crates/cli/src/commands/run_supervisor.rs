use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use hiveguard_bus::EventBus;
use hiveguard_store::MailStore;
use hiveguard_supervisor::{Supervisor, SupervisorConfig};
use tracing::info;

#[derive(Args, Debug)]
pub struct RunSupervisorArgs {
    /// Agent ids to spawn a worker process for.
    #[arg(long, required = true, num_args = 1..)]
    agents: Vec<String>,

    /// MailStore database file.
    #[arg(long)]
    db: PathBuf,

    /// Stop after this many seconds; runs until Ctrl-C when omitted.
    #[arg(long)]
    duration: Option<u64>,

    /// Baseline checkout each worker's workspace is derived from.
    #[arg(long, default_value = ".")]
    baseline: PathBuf,

    /// Root directory under which per-agent worktrees live.
    #[arg(long, default_value = "workspaces")]
    workspaces_root: PathBuf,

    /// Agent authorized to approve mutating gateway actions.
    #[arg(long, default_value = "command")]
    chief_agent: String,

    /// How often the supervisor checks liveness and due heartbeats.
    #[arg(long, default_value_t = 1)]
    poll_interval_seconds: u64,
}

pub async fn run(args: RunSupervisorArgs) -> anyhow::Result<()> {
    let store = MailStore::open(&args.db)?;
    let bus = Arc::new(EventBus::new(store));

    let worker_exe = std::env::current_exe()?;
    let db = args.db.clone();
    let baseline = args.baseline.clone();
    let workspaces_root = args.workspaces_root.clone();
    let chief_agent = args.chief_agent.clone();

    let supervisor = Supervisor::new(Arc::clone(&bus), SupervisorConfig::default(), move |agent_id: &str| {
        tokio::process::Command::new(&worker_exe)
            .arg("run-worker")
            .arg("--agent")
            .arg(agent_id)
            .arg("--db")
            .arg(&db)
            .arg("--baseline")
            .arg(&baseline)
            .arg("--workspaces-root")
            .arg(&workspaces_root)
            .arg("--chief-agent")
            .arg(&chief_agent)
            .spawn()
    });

    supervisor.start(&args.agents).await?;
    info!(agents = ?args.agents, "supervisor started");

    let poll_interval = Duration::from_secs(args.poll_interval_seconds);
    let deadline = args.duration.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = sleep_until_deadline(deadline) => break,
            () = tokio::time::sleep(poll_interval) => {
                supervisor.poll_once().await?;
            }
        }
    }

    supervisor.stop().await?;
    info!("supervisor stopped cleanly");
    Ok(())
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(instant) => tokio::time::sleep_until(instant).await,
        None => std::future::pending().await,
    }
}
