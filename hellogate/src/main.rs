use std::sync::Arc;

use clap::Parser;
use hellogate::{config::Args, telemetry, Config, DualTransportServer, FileStore};
use tokio_util::sync::CancellationToken;

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(&config.log)?;

    tracing::debug!("{:?}", args);

    if !config.service.store_location.is_dir() {
        tracing::warn!(
            store_location = %config.service.store_location.display(),
            "Store location is not an existing directory, attachment writes will fail"
        );
    }

    let service = Arc::new(FileStore::new(config.service.clone()));
    let server = DualTransportServer::new(config, service).bind().await?;

    // Cancel the server once a signal arrives
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    server.run(cancel).await?;
    Ok(())
}
