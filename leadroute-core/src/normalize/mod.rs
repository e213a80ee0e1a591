//! Input normalization: routing tags and raw lead fields

pub mod lead;
pub mod tag;

pub use lead::{normalize_lead, normalize_phone, RawLead, TimestampMode, ValidationError};
pub use tag::normalize_tag;
