//! Liveness probe

use axum::Json;
use leadroute_common::time::{format_lead_timestamp, now_local_naive};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// GET /api/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: format_lead_timestamp(&now_local_naive()),
    })
}
