//! External service clients

pub mod geocoder;
pub mod transaction_client;

pub use geocoder::{locate_property, GeoPoint, Geocoder, KakaoGeocoder};
pub use transaction_client::{DataGoKrClient, TransactionProvider};
