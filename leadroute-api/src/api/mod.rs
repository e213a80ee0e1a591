//! HTTP handlers

pub mod external;
pub mod health;
pub mod leads;

pub use external::receive_external;
pub use health::health_check;
pub use leads::receive_lead;
