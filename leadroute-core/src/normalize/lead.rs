//! Raw lead validation
//!
//! Turns the loosely typed fields of a source row or push request into a
//! [`LeadDraft`]. A draft exists only if the phone number is valid.

use super::tag::normalize_tag;
use chrono::NaiveDateTime;
use leadroute_common::db::LeadDraft;
use leadroute_common::time::{now_local_naive, parse_lead_timestamp, LEAD_TIMESTAMP_FORMAT};
use serde::Deserialize;
use thiserror::Error;

/// Unvalidated lead fields
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawLead {
    #[serde(default)]
    pub created_at: Option<String>,
    pub id: String,
    pub phone: String,
    #[serde(alias = "project_tag")]
    pub tag: String,
}

/// How a missing or malformed `created_at` is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampMode {
    /// Reject the lead (batch ingestion)
    Strict,
    /// Substitute the current local time (push ingestion)
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid phone number: '{0}'")]
    InvalidPhone(String),

    #[error("Invalid created_at '{0}', expected {fmt}", fmt = LEAD_TIMESTAMP_FORMAT)]
    InvalidTimestamp(String),

    #[error("Missing created_at")]
    MissingTimestamp,

    #[error("Missing lead id")]
    MissingId,
}

/// Canonical phone: digits only, `7` followed by exactly ten digits
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && digits.starts_with('7') {
        Some(digits)
    } else {
        None
    }
}

pub fn normalize_lead(raw: &RawLead, mode: TimestampMode) -> Result<LeadDraft, ValidationError> {
    let id = raw.id.trim();
    if id.is_empty() {
        return Err(ValidationError::MissingId);
    }

    let phone = normalize_phone(&raw.phone).ok_or_else(|| ValidationError::InvalidPhone(raw.phone.clone()))?;

    let created_at = resolve_timestamp(raw.created_at.as_deref(), mode)?;

    Ok(LeadDraft {
        id: id.to_string(),
        created_at,
        phone,
        tag: normalize_tag(&raw.tag),
        original_tag: raw.tag.clone(),
    })
}

fn resolve_timestamp(value: Option<&str>, mode: TimestampMode) -> Result<NaiveDateTime, ValidationError> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    match (value, mode) {
        (Some(text), _) => match parse_lead_timestamp(text) {
            Some(ts) => Ok(ts),
            None if mode == TimestampMode::Lenient => {
                tracing::warn!(created_at = %text, "Unparsable created_at, using current time");
                Ok(now_local_naive())
            }
            None => Err(ValidationError::InvalidTimestamp(text.to_string())),
        },
        (None, TimestampMode::Lenient) => Ok(now_local_naive()),
        (None, TimestampMode::Strict) => Err(ValidationError::MissingTimestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(created_at: Option<&str>, phone: &str) -> RawLead {
        RawLead {
            created_at: created_at.map(str::to_string),
            id: "L1".to_string(),
            phone: phone.to_string(),
            tag: "B2_[X1] Acme_new".to_string(),
        }
    }

    #[test]
    fn test_phone_validation() {
        assert_eq!(normalize_phone("79001234567").as_deref(), Some("79001234567"));
        assert_eq!(normalize_phone("+7 (900) 123-45-67").as_deref(), Some("79001234567"));
        assert_eq!(normalize_phone("89001234567"), None);
        assert_eq!(normalize_phone("7900123456"), None);
        assert_eq!(normalize_phone("790012345678"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_valid_lead_produces_draft() {
        let draft = normalize_lead(&raw(Some("2024-01-01 10:00:00"), "79001234567"), TimestampMode::Strict).unwrap();
        assert_eq!(draft.id, "L1");
        assert_eq!(draft.phone, "79001234567");
        assert_eq!(draft.tag, "[X1] Acme");
        assert_eq!(draft.original_tag, "B2_[X1] Acme_new");
        assert_eq!(draft.created_at.to_string(), "2024-01-01 10:00:00");
    }

    #[test]
    fn test_invalid_phone_rejected() {
        let err = normalize_lead(&raw(Some("2024-01-01 10:00:00"), "12345"), TimestampMode::Strict).unwrap_err();
        assert_eq!(err, ValidationError::InvalidPhone("12345".to_string()));
    }

    #[test]
    fn test_strict_mode_rejects_bad_timestamps() {
        assert_eq!(
            normalize_lead(&raw(None, "79001234567"), TimestampMode::Strict).unwrap_err(),
            ValidationError::MissingTimestamp
        );
        assert_eq!(
            normalize_lead(&raw(Some("01.01.2024"), "79001234567"), TimestampMode::Strict).unwrap_err(),
            ValidationError::InvalidTimestamp("01.01.2024".to_string())
        );
    }

    #[test]
    fn test_lenient_mode_substitutes_now() {
        let before = now_local_naive();
        let draft = normalize_lead(&raw(None, "79001234567"), TimestampMode::Lenient).unwrap();
        assert!(draft.created_at >= before);

        let draft = normalize_lead(&raw(Some("garbage"), "79001234567"), TimestampMode::Lenient).unwrap();
        assert!(draft.created_at >= before);
    }

    #[test]
    fn test_missing_id_rejected() {
        let mut input = raw(Some("2024-01-01 10:00:00"), "79001234567");
        input.id = "  ".to_string();
        assert_eq!(normalize_lead(&input, TimestampMode::Lenient).unwrap_err(), ValidationError::MissingId);
    }

    #[test]
    fn test_push_payload_deserializes() {
        let input: RawLead = serde_json::from_str(r#"{"id":"L9","phone":"79001234567","project_tag":"A"}"#).unwrap();
        assert_eq!(input.tag, "A");
        assert!(input.created_at.is_none());
    }
}
