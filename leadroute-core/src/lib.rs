//! leadroute-core library
//!
//! Lead normalization, persistence, client resolution, multi-channel
//! delivery, retries and the batch/daemon drivers. The `leadroute` admin
//! binary and the push API both build on these modules.

pub mod channels;
pub mod daemon;
pub mod directory;
pub mod ingest;
pub mod normalize;
pub mod retry;
pub mod router;
pub mod services;
pub mod sheets;
pub mod source;
pub mod store;
pub mod utils;

pub use crate::ingest::{IntakeError, IntakeOutcome, LeadIntake};
pub use crate::router::{ChannelOutcome, DeliveryRouter, RoutingOutcome};
pub use crate::services::Services;
