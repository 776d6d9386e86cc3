use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::limiter::{Admission, AdmissionController};

/// Authenticated principal, attached to the request as an extension by the
/// auth layer when a bearer token resolves to an account.
#[derive(Debug, Clone)]
pub struct Principal(pub String);

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Admission middleware.
///
/// Classifies the request path, resolves the caller's identity, and runs
/// the token bucket check. Admitted requests are annotated with
/// availability headers; denied ones get a 429 with a fixed JSON body.
pub async fn admission_middleware(
    State(controller): State<Arc<AdmissionController>>,
    req: Request,
    next: Next,
) -> Response {
    let identity = client_identity(&req);
    let path = req.uri().path().to_string();

    match controller.admit(&path, &identity) {
        Admission::Exempt => next.run(req).await,
        Admission::Granted { remaining, .. } => {
            let mut response = next.run(req).await;

            // Both headers report the current availability, not a static
            // ceiling (see DESIGN.md).
            let value = HeaderValue::from(remaining);
            response.headers_mut().insert(LIMIT_HEADER, value.clone());
            response.headers_mut().insert(REMAINING_HEADER, value);

            response
        }
        Admission::Denied { retry_after, .. } => {
            let retry_secs = (retry_after.as_secs_f64().ceil() as u64).max(1);

            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                Json(json!({
                    "error": "TOO_MANY_REQUESTS",
                    "message": "Rate limit exceeded. Please try again later.",
                })),
            )
                .into_response()
        }
    }
}

/// Resolve the identity used to partition rate limits.
///
/// Preference order: authenticated principal, forwarded-for header,
/// real-ip header, transport-level peer address. Authenticated and
/// anonymous identities live in separate namespaces (`user:` vs `ip:`).
fn client_identity(req: &Request) -> String {
    if let Some(principal) = req.extensions().get::<Principal>() {
        return format!("user:{}", principal.0);
    }

    if let Some(ip) = forwarded_ip(req.headers()) {
        return format!("ip:{}", ip);
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }

    "ip:unknown".to_string()
}

/// Best-effort client address from proxy headers.
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            // First value in the chain is the originating client
            if let Some(ip) = xff_str.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    if let Some(xri) = headers.get("x-real-ip") {
        if let Ok(ip_str) = xri.to_str() {
            let ip = ip_str.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    None
}
