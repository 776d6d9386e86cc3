pub mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, middleware::from_fn_with_state, routing::get, routing::post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::Result;
use crate::limiter::AdmissionController;

/// HTTP server configuration
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            metrics_port: 9090,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9090),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the API router with the admission middleware layered in front.
///
/// The routed handlers are demo stubs spanning the three traffic classes;
/// real handlers would be mounted the same way.
pub fn build_router(controller: Arc<AdmissionController>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/courses", get(list_courses))
        .route("/api/courses/{id}/upload", post(upload_material))
        .route("/health", get(health))
        .layer(from_fn_with_state(
            controller,
            middleware::admission_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with graceful shutdown
pub async fn start_server(config: ServerConfig, controller: Arc<AdmissionController>) -> Result<()> {
    let addr: SocketAddr = config.addr().parse().map_err(|e| {
        crate::errors::AdmissionError::InternalError(format!("Invalid server address: {}", e))
    })?;

    info!("Starting HTTP server on {}", addr);

    let router = build_router(controller);
    let listener = TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| crate::errors::AdmissionError::InternalError(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn login() -> Json<Value> {
    Json(json!({ "message": "login accepted" }))
}

async fn register() -> Json<Value> {
    Json(json!({ "message": "registration accepted" }))
}

async fn list_courses() -> Json<Value> {
    Json(json!({ "courses": [] }))
}

async fn upload_material() -> Json<Value> {
    Json(json!({ "message": "upload accepted" }))
}
