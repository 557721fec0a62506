use std::sync::Arc;

use actix_web::web;
use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use webcap_dispatch::browser_gateway::ChromiumoxideGateway;
use webcap_dispatch::cli::{load_config, setup_logging, validate_config, Cli, Commands};
use webcap_dispatch::http;
use webcap_dispatch::worker_pool::WorkerPool;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(args.verbose).map_err(|e| anyhow::anyhow!(e))?;

    info!("Starting webcap-dispatch v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Commands::ValidateConfig { config } => validate_config(config)
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Serve { config, host, port } => run_serve(config, host, port).await,
    }
}

async fn run_serve(config_path: std::path::PathBuf, host: String, port: u16) -> Result<()> {
    let config = load_config(&config_path)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    info!("loaded configuration with {} browsers", config.browsers.len());

    let pool = Arc::new(WorkerPool::initialize(config, Arc::new(ChromiumoxideGateway), None).await?);
    pool.start().await;

    let pool_data = web::Data::from(pool.clone());
    let shutdown_pool = pool.clone();

    let server = tokio::spawn(async move { http::serve(&host, port, pool_data).await });

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel(1);
    let _shutdown_handler = setup_shutdown_handler(shutdown_tx.clone());

    tokio::select! {
        result = server => {
            if let Ok(Err(e)) = result {
                error!("HTTP server error: {e}");
            }
        }
        _ = shutdown_rx.recv() => {
            info!("received shutdown signal");
        }
    }

    info!("shutting down worker pool...");
    shutdown_pool.shutdown().await;
    info!("webcap-dispatch stopped");
    Ok(())
}

fn setup_shutdown_handler(
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("failed to create SIGINT handler");
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to create SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }

        let _ = shutdown_tx.send(());
    })
}
