// src/main.rs
use anyhow::Result;
use apiserver_lb::{config, Balancer, Config};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

/// TCP load balancer for control-plane API servers.
#[derive(Debug, Parser)]
#[command(name = "apiserver-lb", version, about)]
struct Args {
    /// Path to the YAML or JSON configuration file
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("apiserver_lb=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("Loading configuration from: {}", args.config.display());
    let config = config::load_config(&args.config).await?;
    info!(
        "Balancing {} on {} across {} backends",
        config.listen_addr,
        config.bind_addr(),
        config.backends.len()
    );

    tokio::select! {
        _ = run_forever(config) => {}
        _ = shutdown_signal() => {}
    }

    Ok(())
}

/// Build a fresh instance, run it, and start over after a short pause
/// whenever it fails.
async fn run_forever(config: Config) {
    loop {
        match Balancer::new(config.clone()) {
            Ok(balancer) => {
                if let Err(err) = balancer.start().await {
                    error!("Restarting lb because of HARD error: {:#}", err);
                }
            }
            Err(err) => error!("Failed to build load balancer: {:#}", err),
        }

        tokio::time::sleep(config.restart_delay()).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("Failed to install signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
