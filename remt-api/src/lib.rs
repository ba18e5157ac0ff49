//! remt-api library - apartment transaction map service
//!
//! Fetches monthly apartment trade reports for a region, caches each
//! (region, month) window for an hour, and answers single-month,
//! building-history and keyword-search queries over HTTP.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod cache;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod services;

use query::QueryEngine;
use services::Geocoder;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
    /// `None` when no geocoder key is configured
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: QueryEngine, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self {
            engine,
            geocoder,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/api/apartments", get(api::get_month))
        .route("/api/apartments/history", get(api::get_history))
        .route("/api/apartments/search", get(api::get_search))
        .route("/api/geocode", get(api::get_address))
        .route("/api/geocode/property", get(api::get_property))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
