//! signage-controller: control plane for the kiosk fleet.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use signage_config::ControllerConfig;
use signage_controller::Controller;

#[derive(Parser)]
#[command(name = "signage-controller", about = "Digital signage fleet controller")]
struct Args {
    /// Config file. Defaults to the platform config dir.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.listen_addr`.
    #[arg(short, long)]
    listen: Option<String>,

    /// Tracing directive, e.g. `signage_controller=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let (mut config, load_error) = match signage_config::load_controller_config(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (ControllerConfig::default(), Some(e)),
    };

    let directive = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.directive("signage_controller"));
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .init();

    if let Some(e) = load_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }

    let addr = config.server.listen_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!("signage-controller v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    let stop = match signage_common::shutdown_signal() {
        Ok(stop) => stop,
        Err(e) => {
            tracing::error!(error = %e, "could not install signal handlers");
            std::process::exit(1);
        }
    };

    let controller = Controller::start(config);
    let shutdown = async move {
        let signal = stop.await;
        tracing::info!(?signal, "Received shutdown signal");
    };
    if let Err(e) = controller.serve(listener, shutdown).await {
        tracing::error!(error = %e, "server error");
    }
    tracing::info!("Shutdown complete");
}
