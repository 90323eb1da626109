//! Prediction Forms - Main Entry Point
//!
//! Loads every configured deployment up front, then either serves the forms
//! over HTTP or runs a single prediction from the command line.

use anyhow::{Context, Result};
use clap::Parser;
use predict_forms::{
    cli::{predict_once, Args, Command},
    config::{AppConfig, LoggingConfig},
    metrics::MetricsReporter,
    server::{self, AppState},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_from_path(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    init_logging(&config.logging)?;

    info!(
        config = %args.config.display(),
        deployments = config.deployments.len(),
        "Configuration loaded"
    );

    // Every artifact is loaded before the first request can arrive
    let state = Arc::new(AppState::build(&config)?);

    match args.command() {
        Command::Serve => {
            if config.metrics.report_interval_secs > 0 {
                let reporter = MetricsReporter::new(
                    Arc::clone(&state.metrics),
                    config.metrics.report_interval_secs,
                );
                tokio::spawn(reporter.start());
            }
            server::run_server(state, &config.server).await
        }
        Command::Predict { app, fields } => {
            println!("{}", predict_once(&state, &app, &fields)?);
            Ok(())
        }
    }
}

/// RUST_LOG wins over the configured level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    };

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
