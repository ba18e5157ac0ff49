//! HTTP API handlers for remt-api

pub mod apartments;
pub mod geocode;
pub mod health;

pub use apartments::{get_history, get_month, get_search};
pub use geocode::{get_address, get_property};
pub use health::health_routes;
