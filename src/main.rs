//! pulsewatch - Endpoint Uptime Monitor
//!
//! Periodically checks HTTP endpoints, stores the results, and serves a
//! JSON API with bucketed uptime series for charting.

mod checker;
mod config;
mod db;
mod uptime;
mod web;

use checker::CheckScheduler;
use config::ServerConfig;
use db::Store;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("pulsewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting pulsewatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Create scheduler and begin checking stored monitors
    let scheduler = Arc::new(CheckScheduler::new(store.clone(), cfg.retention_days));
    scheduler.start().await?;

    // Start web server
    let server = Server::new(cfg, store, scheduler);
    server.start().await?;

    Ok(())
}
