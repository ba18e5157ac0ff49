//! Address geocoder
//!
//! Resolves free-text Korean addresses to coordinates through the Kakao local
//! address search. [`locate_property`] layers the relaxed-address retries used
//! to place a complex on a map when its exact lot number is unknown to the
//! geocoder.

use async_trait::async_trait;
use remt_common::config::GeocoderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::ServiceError;

/// One geocoding match
///
/// Serialized with the provider's `x`/`y` naming (x = longitude,
/// y = latitude).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    #[serde(rename = "x")]
    pub lng: f64,
    #[serde(rename = "y")]
    pub lat: f64,
    pub road_address: String,
    pub jibun_address: String,
}

/// Address → coordinates lookup
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// All matches for `address`, best first; empty when nothing matched
    async fn lookup(&self, address: &str) -> Result<Vec<GeoPoint>, ServiceError>;
}

/// Kakao address search response
#[derive(Debug, Deserialize)]
struct KakaoResponse {
    #[serde(default)]
    documents: Vec<KakaoDocument>,
}

#[derive(Debug, Deserialize)]
struct KakaoDocument {
    x: String,
    y: String,
    #[serde(default)]
    road_address: Option<KakaoAddress>,
    #[serde(default)]
    address: Option<KakaoAddress>,
}

#[derive(Debug, Deserialize)]
struct KakaoAddress {
    address_name: String,
}

impl KakaoDocument {
    /// `None` when the coordinates are not numbers
    fn into_point(self) -> Option<GeoPoint> {
        Some(GeoPoint {
            lng: self.x.trim().parse().ok()?,
            lat: self.y.trim().parse().ok()?,
            road_address: self.road_address.map(|a| a.address_name).unwrap_or_default(),
            jibun_address: self.address.map(|a| a.address_name).unwrap_or_default(),
        })
    }
}

/// Kakao local address search client
pub struct KakaoGeocoder {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl KakaoGeocoder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::fetch(format!("Failed to build HTTP client: {}", e), ""))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &GeocoderConfig, api_key: String) -> Result<Self, ServiceError> {
        Self::new(config.base_url.clone(), api_key, config.timeout())
    }
}

#[async_trait]
impl Geocoder for KakaoGeocoder {
    async fn lookup(&self, address: &str) -> Result<Vec<GeoPoint>, ServiceError> {
        debug!(address = %address, "Geocoding address");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("query", address)])
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .send()
            .await
            .map_err(|e| ServiceError::fetch(format!("Geocoding request failed: {}", e), ""))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::fetch(format!("Failed to read geocoding body: {}", e), ""))?;

        if !status.is_success() {
            return Err(ServiceError::fetch(
                format!("Geocoder returned HTTP {}", status.as_u16()),
                &body,
            ));
        }

        parse_documents(&body)
    }
}

fn parse_documents(body: &str) -> Result<Vec<GeoPoint>, ServiceError> {
    let parsed: KakaoResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::format(format!("Unexpected geocoder response: {}", e), body))?;

    Ok(parsed
        .documents
        .into_iter()
        .filter_map(KakaoDocument::into_point)
        .collect())
}

/// Candidate addresses for a complex, most specific first
///
/// `"{district} {dong} {jibun}"`, then `"{district} {dong}"`, then
/// `"{city} {dong}"` when the district name has a city prefix
/// (e.g. `"서울특별시 강남구"`).
pub fn address_candidates(district: &str, dong: &str, jibun: &str) -> Vec<String> {
    let district = district.trim();
    let dong = dong.trim();
    let jibun = jibun.trim();

    let mut candidates = Vec::with_capacity(3);
    if !jibun.is_empty() {
        candidates.push(format!("{} {} {}", district, dong, jibun));
    }
    candidates.push(format!("{} {}", district, dong));
    if let Some((city, _)) = district.split_once(' ') {
        candidates.push(format!("{} {}", city, dong));
    }
    candidates
}

/// First point found along the address ladder, or `None`
///
/// Lookup errors are returned as-is rather than treated as "not found".
pub async fn locate_property(
    geocoder: &dyn Geocoder,
    district: &str,
    dong: &str,
    jibun: &str,
) -> Result<Option<GeoPoint>, ServiceError> {
    for address in address_candidates(district, dong, jibun) {
        if let Some(point) = geocoder.lookup(&address).await?.into_iter().next() {
            debug!(address = %address, "Located property");
            return Ok(Some(point));
        }
    }
    Ok(None)
}
