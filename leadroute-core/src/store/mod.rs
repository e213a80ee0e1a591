//! SQLite access for leads, clients and raw push captures

pub mod clients;
pub mod leads;
pub mod raw_webhooks;

pub use clients::ClientStore;
pub use leads::{InsertOutcome, LeadFilter, LeadStore};
pub use raw_webhooks::RawWebhookStore;
