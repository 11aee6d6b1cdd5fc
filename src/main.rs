mod config;
mod error;
mod export;
mod inference_service;
mod jobs;
mod routes;
mod state;
mod translate;
mod utils;

use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use state::AppState;
use translate::TranslatorFactory;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("translate_server=debug,tower_http=debug")),
        )
        .init();

    let (config, loaded_path) = Config::discover()?;
    match &loaded_path {
        Some(path) => info!("Loaded configuration from: {}", path),
        None => info!("No configuration file found, using defaults"),
    }

    let translator = TranslatorFactory::create_translator(&config.translator)?;

    let app_state = AppState::new(config.clone(), translator);
    let sweeper = app_state.store().start_sweeper(config.queue.sweep_interval());
    info!(
        max_concurrent = config.queue.max_concurrent,
        max_chunk_chars = config.queue.max_chunk_chars,
        "Job queue ready"
    );

    let app = routes::create_app(app_state);

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
