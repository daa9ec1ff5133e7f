//! API server

use crate::api::routes::{create_router, AppState};
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// HTTP server for the quality control API
pub struct ApiServer {
    state: AppState,
    max_body_bytes: usize,
}

impl ApiServer {
    pub fn new(state: AppState, max_body_bytes: usize) -> Self {
        Self {
            state,
            max_body_bytes,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all middleware
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().context("Listener has no local address")?;
        info!("API server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .context("API server failed")
    }
}
