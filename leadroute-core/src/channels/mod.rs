//! Outbound delivery channels
//!
//! A channel pushes one lead to one destination. Channels never touch the
//! store: the router records their outcome in the lead's status columns.

pub mod fixed_crm;
pub mod probe;
pub mod sheet;
pub mod webhook;

pub use fixed_crm::FixedCrmChannel;
pub use sheet::SheetChannel;
pub use webhook::WebhookChannel;

use crate::sheets::SheetsError;
use async_trait::async_trait;
use leadroute_common::db::{Client, Lead, StatusColumn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Maximum length of the diagnostic stored in a status column
pub const MAX_DIAGNOSTIC_CHARS: usize = 100;

/// Delivery destination kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Row appended to the client's spreadsheet
    Sheet,
    /// JSON POST to the client's own CRM webhook
    CrmWebhook,
    /// Contact + deal in the fixed CRM account
    FixedCrm,
}

impl ChannelKind {
    /// Status column pair recording this channel's outcome
    pub fn column(self) -> StatusColumn {
        match self {
            ChannelKind::Sheet => StatusColumn::Sheet,
            ChannelKind::CrmWebhook | ChannelKind::FixedCrm => StatusColumn::Crm,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Sheet => "sheet",
            ChannelKind::CrmWebhook => "crm_webhook",
            ChannelKind::FixedCrm => "fixed_crm",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Connection failure or timeout
    #[error("Network - {0}")]
    Network(String),

    #[error("HTTP {status} - {body}")]
    HttpStatus { status: u16, body: String },

    /// Response arrived but could not be interpreted
    #[error("JSON - {0}")]
    MalformedResponse(String),

    /// Destination missing from the client or the configuration
    #[error("Config - {0}")]
    NotConfigured(String),
}

impl ChannelError {
    /// `error: <kind> - <diagnostic>` with the diagnostic bounded in length
    pub fn status_text(&self) -> String {
        let (kind, diagnostic) = match self {
            ChannelError::Network(msg) => ("Network".to_string(), msg.as_str()),
            ChannelError::HttpStatus { status, body } => (format!("HTTP {}", status), body.as_str()),
            ChannelError::MalformedResponse(msg) => ("JSON".to_string(), msg.as_str()),
            ChannelError::NotConfigured(msg) => ("Config".to_string(), msg.as_str()),
        };
        let diagnostic: String = diagnostic.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
        format!("error: {} - {}", kind, diagnostic)
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChannelError::MalformedResponse(err.to_string())
        } else {
            ChannelError::Network(err.to_string())
        }
    }
}

impl From<SheetsError> for ChannelError {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::MissingToken => ChannelError::NotConfigured("Sheets access token not configured".to_string()),
            SheetsError::InvalidUrl(msg) => ChannelError::NotConfigured(msg),
            SheetsError::Network(msg) => ChannelError::Network(msg),
            SheetsError::HttpStatus { status, body } => ChannelError::HttpStatus { status, body },
            SheetsError::Malformed(msg) => ChannelError::MalformedResponse(msg),
        }
    }
}

/// One delivery destination
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Deliver `lead` on behalf of `client`.
    ///
    /// Returns the status text to store on success (always starting with
    /// `delivered`). Makes exactly one attempt.
    async fn deliver(&self, lead: &Lead, client: &Client) -> Result<String, ChannelError>;
}

/// HTTP client shared by channels; every request is bounded by `timeout`
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("leadroute/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Response body text for diagnostics, empty if unreadable
pub(crate) async fn response_text(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}
