//! Client CRM webhook channel

use super::{response_text, ChannelError, ChannelKind, DeliveryChannel};
use async_trait::async_trait;
use leadroute_common::db::{Client, Lead};
use leadroute_common::time::format_lead_timestamp;
use serde::Serialize;
use tracing::info;

/// JSON body POSTed to a client webhook
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub lead_id: &'a str,
    pub created_at: String,
    pub phone: &'a str,
    pub tag: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_tag: Option<&'a str>,
    pub source: &'a str,
    /// Send time, Unix seconds
    pub timestamp: f64,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(lead: &'a Lead, source: &'a str) -> Self {
        Self {
            lead_id: &lead.id,
            created_at: format_lead_timestamp(&lead.created_at),
            phone: &lead.phone,
            tag: &lead.tag,
            original_tag: lead.original_tag.as_deref().filter(|t| !t.is_empty()),
            source,
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

pub struct WebhookChannel {
    http: reqwest::Client,
    source_marker: String,
}

impl WebhookChannel {
    pub fn new(http: reqwest::Client, source_marker: impl Into<String>) -> Self {
        Self {
            http,
            source_marker: source_marker.into(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::CrmWebhook
    }

    async fn deliver(&self, lead: &Lead, client: &Client) -> Result<String, ChannelError> {
        let url = client
            .crm_webhook()
            .ok_or_else(|| ChannelError::NotConfigured(format!("no CRM webhook for client {}", client.name)))?;

        let response = self
            .http
            .post(url)
            .json(&WebhookPayload::new(lead, &self.source_marker))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::HttpStatus {
                status: status.as_u16(),
                body: response_text(response).await,
            });
        }

        info!(lead_id = %lead.id, client = %client.name, "Lead sent to client CRM webhook");
        Ok("delivered".to_string())
    }
}
