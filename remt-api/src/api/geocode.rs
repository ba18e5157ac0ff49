//! Geocoding endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::query::required;
use crate::services::{locate_property, GeoPoint, Geocoder};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddressParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyParams {
    pub district: Option<String>,
    pub dong: Option<String>,
    pub jibun: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub addresses: Vec<GeoPoint>,
}

#[derive(Debug, Serialize)]
pub struct PropertyLocation {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<GeoPoint>,
}

fn geocoder(state: &AppState) -> ApiResult<Arc<dyn Geocoder>> {
    state
        .geocoder
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Geocoding is not configured (KAKAO_REST_API_KEY)".to_string()))
}

/// GET /api/geocode?query=서울시 강남구 역삼동 123
pub async fn get_address(
    State(state): State<AppState>,
    Query(params): Query<AddressParams>,
) -> ApiResult<Json<AddressResponse>> {
    let address = required("query", params.query.as_deref())?;
    let geocoder = geocoder(&state)?;

    let addresses = geocoder.lookup(&address).await?;
    Ok(Json(AddressResponse { addresses }))
}

/// GET /api/geocode/property?district=서울특별시 강남구&dong=역삼동&jibun=123
pub async fn get_property(
    State(state): State<AppState>,
    Query(params): Query<PropertyParams>,
) -> ApiResult<Json<PropertyLocation>> {
    let district = required("district", params.district.as_deref())?;
    let dong = required("dong", params.dong.as_deref())?;
    let jibun = params.jibun.unwrap_or_default();
    let geocoder = geocoder(&state)?;

    let point = locate_property(geocoder.as_ref(), &district, &dong, &jibun).await?;
    Ok(Json(PropertyLocation {
        found: point.is_some(),
        point,
    }))
}
