use clap::Parser;
use eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_relay::config::RelayConfig;
use travel_relay::relay::{Relay, RelayOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration directory
    #[arg(long, default_value = "./configs/dev")]
    config_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Build and log transactions without sending them
    #[arg(long)]
    dry_run: bool,

    /// Disable the per-chain event pollers
    #[arg(long)]
    no_poller: bool,

    /// Disable the exploration scheduler
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting travel relay");

    let config_dir = PathBuf::from(&cli.config_path);
    let mut config = RelayConfig::load_from_dir(&config_dir)
        .await?
        .with_env_overrides();
    if cli.dry_run {
        config.dry_run = true;
    }
    config.validate()?;

    tracing::info!(
        home_chain = config.home.chain_id,
        chains = config.chains.len(),
        gateway = config.home.gateway_enabled,
        dry_run = config.dry_run,
        poll_secs = config.polling.interval_secs,
        tick_secs = config.exploration.tick_interval_secs,
        "Config loaded"
    );

    let relay = Relay::build(config).await?;
    let cancel_token = relay.cancel_token();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("🛑 Ctrl-C received, shutting down"),
            Err(e) => tracing::error!(%e, "Failed to listen for Ctrl-C, shutting down"),
        }
        cancel_token.cancel();
    });

    relay
        .run(RelayOptions {
            run_pollers: !cli.no_poller,
            run_scheduler: !cli.no_scheduler,
        })
        .await
}
