//! Web server module.

mod handlers;

pub use handlers::*;

use crate::checker::CheckScheduler;
use crate::config::ServerConfig;
use crate::db::Store;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub scheduler: Arc<CheckScheduler>,
}

/// Web server for pulsewatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, scheduler: Arc<CheckScheduler>) -> Self {
        Self {
            state: AppState {
                config,
                store,
                scheduler,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Monitors
            .route("/api/monitors", get(handlers::handle_list_monitors))
            .route("/api/monitors", post(handlers::handle_create_monitor))
            .route("/api/monitors/{id}", get(handlers::handle_get_monitor))
            .route("/api/monitors/{id}", put(handlers::handle_update_monitor))
            .route("/api/monitors/{id}", delete(handlers::handle_delete_monitor))
            .route("/api/monitors/{id}/pause", post(handlers::handle_pause_monitor))
            .route("/api/monitors/{id}/resume", post(handlers::handle_resume_monitor))
            // Checks and derived views
            .route("/api/monitors/{id}/checks", get(handlers::handle_get_checks))
            .route("/api/monitors/{id}/uptime", get(handlers::handle_get_uptime))
            .route("/api/monitors/{id}/stats", get(handlers::handle_get_stats))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
