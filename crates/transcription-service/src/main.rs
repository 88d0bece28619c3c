use axum::Router;
use eyre::Result;
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use transcription_service::retention::spawn_retention_sweeper;
use transcription_service::{AppState, create_router, load_service_config};

// Extract initialization logic to a testable function
pub fn initialize_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| eyre::eyre!("setting default subscriber failed: {}", e))?;

    Ok(())
}

// Extract server setup to a testable function
pub async fn setup_server(
    app: Router,
    addr: SocketAddr,
) -> Result<(
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
    SocketAddr,
)> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let server = axum::serve(listener, app);
    let handle = tokio::spawn(async move { server.await });

    Ok((handle, local_addr))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    initialize_tracing()?;

    info!("Starting transcription HTTP service");

    // Load configuration
    let config = load_service_config()?;
    info!(
        "Delegating to {} {}",
        config.program,
        config.program_args.join(" ")
    );
    info!("Writing results to {}", config.results_dir.display());

    let state = AppState::from_config(&config).await;

    let sweeper = config.retention.map(|retention| {
        spawn_retention_sweeper(state.registry.clone(), retention, config.sweep_interval)
    });

    // Setup server
    let (handle, addr) = setup_server(create_router(state), config.addr).await?;
    info!("Starting HTTP server on {}", addr);

    // Handle Ctrl+C for graceful shutdown
    info!("Waiting for shutdown signal...");
    signal::ctrl_c().await?;
    info!("Received shutdown signal, initiating graceful shutdown...");

    info!("Shutting down HTTP server...");
    handle.abort();
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_setup_server_binds_ephemeral_port() {
        let app = Router::new().route("/health", get(|| async { "ok" }));

        let result = setup_server(app, SocketAddr::from(([127, 0, 0, 1], 0))).await;
        assert!(result.is_ok());

        let (handle, addr) = result.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[test]
    fn test_initialize_tracing_only_once() {
        assert!(initialize_tracing().is_ok());
        assert!(initialize_tracing().is_err());
    }
}
