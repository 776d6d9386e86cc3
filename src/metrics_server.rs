use std::net::SocketAddr;

use axum::{
    Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::errors::{AdmissionError, Result};

/// Start the HTTP server for the Prometheus metrics endpoint
pub async fn start_metrics_server(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let router = Router::new().route("/metrics", get(serve_metrics));

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AdmissionError::InternalError(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on http://{}/metrics", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| AdmissionError::InternalError(format!("Metrics server error: {}", e)))?;

    Ok(())
}

async fn serve_metrics() -> Response {
    match gather_metrics() {
        Ok(metrics) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Encode the process registry in the Prometheus text format
fn gather_metrics() -> std::result::Result<String, String> {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e))
}
