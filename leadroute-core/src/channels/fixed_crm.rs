//! Fixed CRM channel
//!
//! Bitrix24-style REST account shared by every lead routed here: a contact
//! is created first, then a deal bound to that contact. Each step must
//! answer with a non-empty `result` id.

use super::{response_text, ChannelError, ChannelKind, DeliveryChannel};
use async_trait::async_trait;
use leadroute_common::config::FixedCrmConfig;
use leadroute_common::db::{Client, Lead};
use leadroute_common::time::format_lead_timestamp;
use serde_json::{json, Value};
use tracing::{debug, info};

pub struct FixedCrmChannel {
    http: reqwest::Client,
    contact_url: String,
    deal_url: String,
    assigned_by_id: i64,
    source_marker: String,
}

impl FixedCrmChannel {
    pub fn new(http: reqwest::Client, config: &FixedCrmConfig, source_marker: impl Into<String>) -> Self {
        Self {
            http,
            contact_url: config.contact_url.clone(),
            deal_url: config.deal_url.clone(),
            assigned_by_id: config.assigned_by_id,
            source_marker: source_marker.into(),
        }
    }

    fn comment(&self, lead: &Lead) -> String {
        format!("Created by {}. ID: {}, Tag: {}", self.source_marker, lead.id, lead.tag)
    }

    fn contact_payload(&self, lead: &Lead) -> Value {
        json!({
            "fields": {
                "NAME": "Contact",
                "PHONE": [{ "VALUE": lead.phone, "VALUE_TYPE": "WORK" }],
                "SOURCE_ID": "WEB",
                "SOURCE_DESCRIPTION": lead.tag,
                "COMMENTS": self.comment(lead),
            },
            "params": { "REGISTER_SONET_EVENT": "Y" }
        })
    }

    fn deal_payload(&self, lead: &Lead, contact_id: &str) -> Value {
        let created_at = format_lead_timestamp(&lead.created_at);
        let additional = json!({
            "lead_id": lead.id,
            "original_tag": lead.original_tag,
            "created_at": created_at,
            "source": self.source_marker,
        });
        json!({
            "fields": {
                "TITLE": format!("Request {} from {}", lead.tag, created_at),
                "STAGE_ID": "NEW",
                "CONTACT_ID": contact_id,
                "SOURCE_ID": "WEB",
                "SOURCE_DESCRIPTION": lead.tag,
                "COMMENTS": self.comment(lead),
                "ASSIGNED_BY_ID": self.assigned_by_id,
                "CATEGORY_ID": 0,
                "OPENED": "Y",
                "ADDITIONAL_INFO": additional.to_string(),
            },
            "params": { "REGISTER_SONET_EVENT": "Y" }
        })
    }

    /// POST `payload` and return the `result` id of the created entity
    async fn create(&self, url: &str, payload: &Value, entity: &str) -> Result<String, ChannelError> {
        let response = self.http.post(url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::HttpStatus {
                status: status.as_u16(),
                body: response_text(response).await,
            });
        }

        let body: Value = response.json().await?;
        result_id(&body).ok_or_else(|| ChannelError::MalformedResponse(format!("no {} id in response: {}", entity, body)))
    }
}

/// Non-empty `result` field as text
fn result_id(body: &Value) -> Option<String> {
    match body.get("result")? {
        Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[async_trait]
impl DeliveryChannel for FixedCrmChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::FixedCrm
    }

    async fn deliver(&self, lead: &Lead, _client: &Client) -> Result<String, ChannelError> {
        let contact_id = self.create(&self.contact_url, &self.contact_payload(lead), "contact").await?;
        debug!(lead_id = %lead.id, contact_id = %contact_id, "Fixed CRM contact created");

        let deal_id = self
            .create(&self.deal_url, &self.deal_payload(lead, &contact_id), "deal")
            .await?;

        info!(lead_id = %lead.id, contact_id = %contact_id, deal_id = %deal_id, "Lead delivered to fixed CRM");
        Ok(format!("delivered: Contact {}, Deal {}", contact_id, deal_id))
    }
}
