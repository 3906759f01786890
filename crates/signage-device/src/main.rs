//! signage-device: kiosk client for the signage controller.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use signage_config::DeviceConfig;
use signage_device::Device;

#[derive(Parser)]
#[command(name = "signage-device", about = "Digital signage kiosk client")]
struct Args {
    /// Config file. Defaults to the platform config dir.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tracing directive, e.g. `signage_device=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let (config, load_error) = match signage_config::load_device_config(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => {
            let mut config = DeviceConfig::default();
            signage_config::env::apply_device_env(&mut config);
            (config, Some(e))
        }
    };

    let directive = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.directive("signage_device"));
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .init();

    if let Some(e) = load_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    tracing::info!(
        "signage-device v{} starting as {}",
        env!("CARGO_PKG_VERSION"),
        config.device.id
    );

    let stop = match signage_common::shutdown_signal() {
        Ok(stop) => stop,
        Err(e) => {
            tracing::error!(error = %e, "could not install signal handlers");
            std::process::exit(1);
        }
    };
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        let signal = stop.await;
        tracing::info!(?signal, "Received shutdown signal");
        signal_token.cancel();
    });

    let device = Arc::new(Device::new(config));
    if let Err(e) = device.run(shutdown).await {
        tracing::error!(error = %e, "device client stopped");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}
