//! NEU Quality Control - Main Entry Point
//!
//! Loads the defect classifier (or falls back to mock inference) and serves
//! the inspection API.

use anyhow::{Context, Result};
use neu_quality_control::{
    api::{ApiServer, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::MetricsReporter,
    models::InferenceEngine,
    store::InMemoryPieceStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info")
            .add_directive(format!("neu_quality_control={}", config.level).parse()?)
            .add_directive(format!("tower_http={}", config.level).parse()?),
    };

    if config.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_logging(&config.logging)?;

    info!("Starting NEU Quality Control API");
    info!(
        bind = %config.bind_addr(),
        uploads_dir = %config.storage.uploads_dir,
        reports_dir = %config.storage.reports_dir,
        "Configuration loaded successfully"
    );

    tokio::fs::create_dir_all(&config.storage.uploads_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.storage.uploads_dir))?;
    tokio::fs::create_dir_all(&config.storage.reports_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.storage.reports_dir))?;

    // Model loading happens once, before the first request
    let models = config.models.clone();
    let engine = tokio::task::spawn_blocking(move || InferenceEngine::new(&models))
        .await
        .context("Model loading task failed")?;
    let engine = Arc::new(engine);

    let state = AppState::new(
        engine,
        Arc::new(InMemoryPieceStore::new()),
        &config.storage.uploads_dir,
        &config.storage.reports_dir,
    );

    // Periodic metrics summaries
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(state.metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let server = ApiServer::new(state, config.server.max_body_bytes);
    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    server
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    info!("Server shutting down...");
    server.state().metrics.print_summary();

    Ok(())
}
