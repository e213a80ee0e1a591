//! # LeadRoute Common Library
//!
//! Shared code for the LeadRoute binaries:
//! - Database schema initialization and row models (leads, clients)
//! - Bootstrap configuration loading (TOML + environment)
//! - Tracing setup
//! - Error types and timestamp/UUID helpers

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
