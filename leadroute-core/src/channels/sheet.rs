//! Spreadsheet channel: one appended row per lead

use super::{ChannelError, ChannelKind, DeliveryChannel};
use crate::sheets::SheetsClient;
use async_trait::async_trait;
use leadroute_common::db::{Client, Lead};
use leadroute_common::time::{format_lead_timestamp, now_local_naive};
use tracing::info;

pub struct SheetChannel {
    sheets: SheetsClient,
}

impl SheetChannel {
    pub fn new(sheets: SheetsClient) -> Self {
        Self { sheets }
    }
}

/// `[sent_at, created_at, id, phone, tag]`
pub fn lead_row(lead: &Lead) -> Vec<String> {
    vec![
        format_lead_timestamp(&now_local_naive()),
        format_lead_timestamp(&lead.created_at),
        lead.id.clone(),
        lead.phone.clone(),
        lead.tag.clone(),
    ]
}

#[async_trait]
impl DeliveryChannel for SheetChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sheet
    }

    async fn deliver(&self, lead: &Lead, client: &Client) -> Result<String, ChannelError> {
        let (spreadsheet_id, sheet_name) = client
            .sheet_destination()
            .ok_or_else(|| ChannelError::NotConfigured(format!("no spreadsheet for client {}", client.name)))?;

        let range = format!("{}!A:E", sheet_name);
        self.sheets.append_row(spreadsheet_id, &range, lead_row(lead)).await?;

        info!(lead_id = %lead.id, client = %client.name, "Lead appended to client spreadsheet");
        Ok("delivered".to_string())
    }
}
