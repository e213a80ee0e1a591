//! Raw capture of third-party pushes whose format is not yet mapped

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::{ApiError, AppState};

/// POST /api/external
///
/// Stores the body verbatim in `raw_webhooks`; nothing is routed.
pub async fn receive_external(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(format!("Expected a JSON body: {}", e.body_text())))?;

    let id = state.services.raw_webhooks.capture(&payload).await?;
    info!(raw_id = id, "External payload captured");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Payload received and stored",
        })),
    ))
}
