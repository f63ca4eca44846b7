use clap::Parser;
use pkg_constants::controller::{DEFAULT_REQUEUE_DELAY_MS, DEFAULT_RESYNC_SECS};
use pkg_controllers::dispatch::Dispatcher;
use pkg_controllers::netset::NetSetController;
use pkg_state::client::StateStore;
use pkg_types::config::{ControllerConfigFile, load_config_file};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "netset-controller", about = "netset reconciliation controller")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = "/etc/netset/config.yaml")]
    config: String,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Full resync interval in seconds
    #[arg(long)]
    resync_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: ControllerConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| "/var/lib/netset/data".to_string());
    let resync_secs = cli
        .resync_secs
        .or(file_cfg.resync_secs)
        .unwrap_or(DEFAULT_RESYNC_SECS);
    let requeue_delay_ms = file_cfg
        .requeue_delay_ms
        .unwrap_or(DEFAULT_REQUEUE_DELAY_MS);

    info!("Starting netset-controller");
    info!("  Data dir: {}", data_dir);
    info!("  Resync:   {}s", resync_secs);
    info!("  Requeue:  {}ms", requeue_delay_ms);

    let store = StateStore::new(&data_dir).await?;
    let controller = NetSetController::new(store.clone());
    let dispatcher = Dispatcher::new(
        store.clone(),
        Duration::from_millis(requeue_delay_ms),
        Duration::from_secs(resync_secs),
    );
    let handle = dispatcher.start(controller);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.abort();
    store.close().await?;

    Ok(())
}
