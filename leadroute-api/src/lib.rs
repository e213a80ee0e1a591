//! leadroute-api library - push intake endpoints
//!
//! Suppliers POST single leads to `/api/lead`; they are normalized, stored
//! and routed through the same intake path as the batch source scan.

use axum::routing::{get, post};
use axum::Router;
use leadroute_core::Services;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::ApiError;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/lead", post(api::receive_lead))
        .route("/api/external", post(api::receive_external))
        .route("/api/health", get(api::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
