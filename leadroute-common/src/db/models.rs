//! Database models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column list matching [`Lead`], in declaration order
pub const LEAD_COLUMNS: &str = "id, created_at, phone, tag, original_tag, processed_at, client_id, \
     sheet_delivery_status, sheet_delivery_time, crm_delivery_status, crm_delivery_time, \
     delivery_attempts";

/// Column list matching [`Client`]
pub const CLIENT_COLUMNS: &str =
    "id, name, tag, spreadsheet_id, sheet_name, use_crm, webhook_url, created_at";

/// Persisted lead row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: String,
    /// Wall-clock time reported by the source system
    pub created_at: NaiveDateTime,
    /// Canonical 11-digit phone number
    pub phone: String,
    /// Normalized routing key
    pub tag: String,
    /// Tag exactly as received
    pub original_tag: Option<String>,
    pub processed_at: Option<NaiveDateTime>,
    pub client_id: Option<String>,
    pub sheet_delivery_status: Option<String>,
    pub sheet_delivery_time: Option<NaiveDateTime>,
    pub crm_delivery_status: Option<String>,
    pub crm_delivery_time: Option<NaiveDateTime>,
    pub delivery_attempts: i64,
}

impl Lead {
    pub fn status(&self, column: StatusColumn) -> Option<&str> {
        match column {
            StatusColumn::Sheet => self.sheet_delivery_status.as_deref(),
            StatusColumn::Crm => self.crm_delivery_status.as_deref(),
        }
    }

    pub fn delivery_time(&self, column: StatusColumn) -> Option<NaiveDateTime> {
        match column {
            StatusColumn::Sheet => self.sheet_delivery_time,
            StatusColumn::Crm => self.crm_delivery_time,
        }
    }

    pub fn state(&self, column: StatusColumn) -> DeliveryState {
        DeliveryState::classify(self.status(column))
    }

    /// Original tag if recorded, otherwise the normalized one
    pub fn original_tag_or_tag(&self) -> &str {
        self.original_tag.as_deref().unwrap_or(&self.tag)
    }
}

/// Validated lead that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadDraft {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub phone: String,
    pub tag: String,
    pub original_tag: String,
}

/// Registered client (tag owner and its destinations)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub tag: String,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub use_crm: bool,
    pub webhook_url: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Client {
    /// `(spreadsheet_id, sheet_name)` when both are configured
    pub fn sheet_destination(&self) -> Option<(&str, &str)> {
        match (non_blank(&self.spreadsheet_id), non_blank(&self.sheet_name)) {
            (Some(id), Some(name)) => Some((id, name)),
            _ => None,
        }
    }

    /// Webhook URL when CRM delivery is enabled and configured
    pub fn crm_webhook(&self) -> Option<&str> {
        if self.use_crm {
            non_blank(&self.webhook_url)
        } else {
            None
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Registration request for a new client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub tag: String,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub use_crm: bool,
    pub webhook_url: Option<String>,
}

/// Partial client update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub use_crm: Option<bool>,
    pub webhook_url: Option<String>,
}

impl ClientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tag.is_none()
            && self.spreadsheet_id.is_none()
            && self.sheet_name.is_none()
            && self.use_crm.is_none()
            && self.webhook_url.is_none()
    }
}

/// Per-channel status column pair of the leads table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColumn {
    Sheet,
    Crm,
}

impl StatusColumn {
    pub const ALL: [StatusColumn; 2] = [StatusColumn::Sheet, StatusColumn::Crm];

    pub fn status_field(self) -> &'static str {
        match self {
            StatusColumn::Sheet => "sheet_delivery_status",
            StatusColumn::Crm => "crm_delivery_status",
        }
    }

    pub fn time_field(self) -> &'static str {
        match self {
            StatusColumn::Sheet => "sheet_delivery_time",
            StatusColumn::Crm => "crm_delivery_time",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusColumn::Sheet => "sheet",
            StatusColumn::Crm => "crm",
        }
    }
}

impl fmt::Display for StatusColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StatusColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sheet" | "sheets" => Ok(StatusColumn::Sheet),
            "crm" | "webhook" => Ok(StatusColumn::Crm),
            other => Err(format!("unknown delivery target '{}' (expected sheet or crm)", other)),
        }
    }
}

/// Classified value of a per-channel status column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Delivered,
    Error,
}

impl DeliveryState {
    /// Null is pending, a `delivered` prefix is delivered, anything else is an error
    pub fn classify(status: Option<&str>) -> Self {
        match status {
            None => DeliveryState::Pending,
            Some(s) if s.starts_with("delivered") => DeliveryState::Delivered,
            Some(_) => DeliveryState::Error,
        }
    }
}
