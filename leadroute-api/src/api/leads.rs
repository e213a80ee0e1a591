//! Single-lead push intake

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use leadroute_core::channels::ChannelKind;
use leadroute_core::normalize::{RawLead, TimestampMode};
use leadroute_core::{ChannelOutcome, IntakeOutcome};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub success: bool,
    pub message: String,
    pub lead_id: String,
    pub duplicate: bool,
    /// Client found for the lead's tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
    /// At least one channel delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<ChannelKind, ChannelOutcome>,
}

/// String or number field as text; suppliers send ids both ways
fn field_text(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match body.get(*key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Lead fields from a push body: `{created_at?, id, phone, project_tag}`
pub fn raw_lead_from_json(body: &Value) -> Result<RawLead, ApiError> {
    if !body.is_object() {
        return Err(ApiError::BadRequest("Expected a JSON object".to_string()));
    }

    let phone = field_text(body, &["phone"]).ok_or_else(|| ApiError::BadRequest("Missing phone".to_string()))?;

    Ok(RawLead {
        created_at: field_text(body, &["created_at"]),
        id: field_text(body, &["id"]).unwrap_or_default(),
        phone,
        tag: field_text(body, &["project_tag", "tag"]).unwrap_or_default(),
    })
}

/// POST /api/lead
///
/// A missing or malformed `created_at` falls back to the current time.
/// Delivery failures do not fail the request: the lead is stored and left
/// for retry sweeps, and `delivered` reports the outcome.
pub async fn receive_lead(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<LeadResponse>), ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(format!("Expected a JSON body: {}", e.body_text())))?;
    let raw = raw_lead_from_json(&body)?;
    info!(lead_id = %raw.id, tag = %raw.tag, "Push lead received");

    let response = match state.services.intake.accept(&raw, TimestampMode::Lenient).await? {
        IntakeOutcome::Duplicate { lead_id } => LeadResponse {
            success: true,
            message: "Lead already received".to_string(),
            lead_id,
            duplicate: true,
            resolved: None,
            delivered: None,
            channels: BTreeMap::new(),
        },
        IntakeOutcome::Inserted(outcome) => {
            let delivered = outcome.is_sent();
            let message = if !outcome.resolved {
                "Lead stored; no client for tag"
            } else if delivered {
                "Lead stored and delivered"
            } else {
                "Lead stored; delivery pending retry"
            };
            LeadResponse {
                success: true,
                message: message.to_string(),
                lead_id: outcome.lead_id,
                duplicate: false,
                resolved: Some(outcome.resolved),
                delivered: Some(delivered),
                channels: outcome.per_channel,
            }
        }
    };

    Ok((StatusCode::CREATED, Json(response)))
}
