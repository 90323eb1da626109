//! HTTP front-end: one form and one JSON endpoint per deployment

mod api;
mod handlers;
pub mod pages;
mod state;

pub use api::create_router;
pub use state::{AppState, Deployment};

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;

/// Serve until ctrl+c
pub async fn run_server(state: Arc<AppState>, config: &ServerConfig) -> anyhow::Result<()> {
    let start_time = state.started_at;
    let app = create_router(Arc::clone(&state), config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        address = %addr,
        deployments = state.deployments().len(),
        request_timeout_ms = config.request_timeout_ms,
        "Prediction server starting"
    );
    for deployment in state.deployments() {
        info!(
            deployment = %deployment.name(),
            url = %format!("http://{}/apps/{}", addr, deployment.name()),
            "Form available"
        );
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    state.metrics.print_summary();
    info!("Server shut down cleanly");
    Ok(())
}
