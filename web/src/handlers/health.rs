//! Liveness endpoint for load balancers.

use axum::Json;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// `GET /health`
///
/// Does not probe the store; a wedged database surfaces as 500s on the API.
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
