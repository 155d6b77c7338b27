use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use hiveguard_projector::Materializer;
use hiveguard_store::MailStore;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunProjectorArgs {
    /// MailStore database file.
    #[arg(long)]
    db: PathBuf,

    /// Projection view file, written atomically after each cycle.
    #[arg(long)]
    view: PathBuf,

    /// Materialize a single cycle and exit instead of looping.
    #[arg(long)]
    once: bool,

    /// Seconds between materialization cycles.
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,
}

pub async fn run(args: RunProjectorArgs) -> anyhow::Result<()> {
    let store = MailStore::open(&args.db)?;
    let materializer = Materializer::new(store, args.view.clone());

    if args.once {
        let view = materializer.run_once().await?;
        info!(events_processed = view.events_processed, running = view.running, "projection cycle complete");
        return Ok(());
    }

    let poll_interval = Duration::from_secs(args.poll_interval);
    let stop = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    materializer.run(poll_interval, stop).await?;
    info!("projector stopped cleanly");
    Ok(())
}
