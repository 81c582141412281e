use clap::Parser;
use pkg_constants::controller::{DEFAULT_CONFIG_PATH, DEFAULT_DATA_DIR};
use pkg_controllers::client::StoreClient;
use pkg_controllers::manager::{ControllerOptions, HpaTransferController};
use pkg_state::client::StateStore;
use pkg_types::config::{ControllerConfigFile, load_config_file};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "hpa-transfer",
    about = "Migrates annotated HorizontalPodAutoscalers to ScaledObjects"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: ControllerConfigFile = load_config_file(&cli.config)?;
    init_logging(cli.log_json || file_cfg.log_json.unwrap_or(false));
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
    let defaults = ControllerOptions::default();
    let options = ControllerOptions {
        max_concurrent_reconciles: file_cfg
            .max_concurrent_reconciles
            .unwrap_or(defaults.max_concurrent_reconciles),
        call_timeout: file_cfg
            .call_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.call_timeout),
        base_backoff: file_cfg
            .base_backoff_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_backoff),
        max_backoff: file_cfg
            .max_backoff_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.max_backoff),
    };

    info!("Starting hpa-transfer");
    info!("  Data dir:  {}", data_dir);
    info!("  Workers:   {}", options.max_concurrent_reconciles);

    let store = StateStore::new(&data_dir).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller =
        HpaTransferController::new(StoreClient::new(store.clone()), &store.event_log, options);
    let mut handle = controller.start(shutdown_rx);

    // Exit on ctrl-c, or as soon as the controller stops on its own.
    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
            handle.await?
        }
        joined = &mut handle => {
            let result = joined?;
            if let Err(e) = &result {
                error!("HpaTransferController exited: {:#}", e);
            }
            result
        }
    };

    store.close().await?;
    result
}
