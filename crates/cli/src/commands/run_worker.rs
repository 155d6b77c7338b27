use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use hiveguard_bus::EventBus;
use hiveguard_gateway::{GatewayConfig, ToolGateway};
use hiveguard_store::MailStore;
use hiveguard_worker::{Worker, WorkerConfig};
use hiveguard_workspace::WorkspaceManager;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunWorkerArgs {
    /// This worker's agent id.
    #[arg(long)]
    agent: String,

    /// MailStore database file.
    #[arg(long)]
    db: PathBuf,

    /// Baseline checkout this worker's workspace is derived from.
    #[arg(long, default_value = ".")]
    baseline: PathBuf,

    /// Root directory under which per-agent worktrees live.
    #[arg(long, default_value = "workspaces")]
    workspaces_root: PathBuf,

    /// Agent authorized to approve mutating gateway actions.
    #[arg(long, default_value = "command")]
    chief_agent: String,

    /// Stop after this many seconds; runs until Ctrl-C when omitted. Chiefly
    /// useful for scripted scenario tests.
    #[arg(long)]
    duration: Option<u64>,
}

pub async fn run(args: RunWorkerArgs) -> anyhow::Result<()> {
    let store = MailStore::open(&args.db)?;
    let bus = Arc::new(EventBus::new(store.clone()));

    let workspace = WorkspaceManager::new(args.baseline.clone(), args.workspaces_root.clone());
    workspace.ensure_worktrees(std::slice::from_ref(&args.agent), false)?;
    let gateway_config = GatewayConfig::new(args.chief_agent.clone());
    let gateway = Arc::new(ToolGateway::new(store, workspace, gateway_config));

    let worker = Worker::new(args.agent.clone(), Arc::clone(&bus), WorkerConfig::default()).with_gateway(gateway);

    info!(agent = %args.agent, consumer_id = worker.consumer_id(), "worker starting");

    let stop = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };

    worker.run(stop).await?;
    info!(agent = %args.agent, "worker stopped cleanly");
    Ok(())
}
