//! Database schema, initialization and row models

pub mod init;
pub mod models;
pub mod schema_sync;

pub use init::*;
pub use models::*;
pub use schema_sync::*;
