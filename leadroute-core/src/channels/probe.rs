//! Destination verification used when registering a client

use super::{response_text, ChannelError};
use crate::sheets::SheetsClient;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// POST a `{test: true}` payload; any 2xx answer counts as reachable
pub async fn probe_webhook(http: &reqwest::Client, url: &str, timeout: Duration) -> Result<(), ChannelError> {
    let response = http
        .post(url)
        .timeout(timeout)
        .json(&json!({
            "test": true,
            "timestamp": chrono::Utc::now().timestamp(),
        }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response_text(response).await;
        warn!(url = %url, status = status.as_u16(), "Webhook probe rejected");
        return Err(ChannelError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    info!(url = %url, "Webhook probe succeeded");
    Ok(())
}

/// The spreadsheet must be reachable and contain the named tab
pub async fn probe_sheet(sheets: &SheetsClient, spreadsheet_id: &str, sheet_name: &str) -> Result<(), ChannelError> {
    if sheets.sheet_exists(spreadsheet_id, sheet_name).await? {
        info!(spreadsheet_id = %spreadsheet_id, sheet = %sheet_name, "Spreadsheet destination verified");
        Ok(())
    } else {
        Err(ChannelError::NotConfigured(format!(
            "sheet '{}' not found in spreadsheet {}",
            sheet_name, spreadsheet_id
        )))
    }
}
