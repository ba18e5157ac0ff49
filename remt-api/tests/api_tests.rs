//! Integration tests for remt-api HTTP endpoints
//!
//! Tests cover:
//! - Parameter validation (400 before any upstream call)
//! - Single-month, history and search response shapes
//! - Upstream error mapping (500 fetch, 502 format)
//! - Geocoding endpoints with and without a configured geocoder
//! - Health endpoint

mod helpers;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{engine, item, json_payload, Behavior, MockProvider};
use remt_api::error::ServiceError;
use remt_api::services::{GeoPoint, Geocoder};
use remt_api::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

/// Geocoder that only knows one address
struct OneAddressGeocoder;

#[async_trait]
impl Geocoder for OneAddressGeocoder {
    async fn lookup(&self, address: &str) -> Result<Vec<GeoPoint>, ServiceError> {
        if address == "서울특별시 강남구 역삼동" {
            Ok(vec![GeoPoint {
                lng: 127.036,
                lat: 37.5,
                road_address: String::new(),
                jibun_address: "서울 강남구 역삼동".to_string(),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Test helper: app over a mock provider, optionally with a geocoder
fn setup_app(provider: Arc<MockProvider>, geocoder: Option<Arc<dyn Geocoder>>) -> Router {
    let (engine, _clock) = engine(provider);
    build_router(AppState::new(engine, geocoder))
}

fn sample_provider() -> Arc<MockProvider> {
    Arc::new(MockProvider::new(Behavior::Payload(json_payload(&[
        item("래미안", "123", "95,000", (2024, 3, 2), 2005),
        item("래미안", "123", "97,000", (2024, 3, 20), 2005),
        item("자이", "7", "120,000", (2024, 3, 9), 2018),
    ]))))
}

/// Percent-encode a query value
fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

/// Test helper: issue a GET and return status plus JSON body
async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    (status, serde_json::from_slice(&bytes).expect("Should parse JSON"))
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(sample_provider(), None);

    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "remt-api");
    assert!(body["version"].is_string());
    assert_eq!(body["cachedWindows"], 0);
}

#[tokio::test]
async fn test_health_reports_cached_windows() {
    let app = setup_app(sample_provider(), None);

    get(&app, "/api/apartments?regionCode=11680&yearMonth=202403").await;
    let (_, body) = get(&app, "/health").await;
    assert_eq!(body["cachedWindows"], 1);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_parameters_are_rejected_before_upstream() {
    let provider = sample_provider();
    let app = setup_app(provider.clone(), None);

    let uris = [
        "/api/apartments",
        "/api/apartments?regionCode=11680",
        "/api/apartments?yearMonth=202403",
        "/api/apartments?regionCode=%20&yearMonth=202403",
        "/api/apartments?regionCode=11680&yearMonth=2024-03",
        "/api/apartments?regionCode=11680&yearMonth=202400",
        "/api/apartments?regionCode=11_680&yearMonth=202403",
        "/api/apartments/history?regionCode=11680",
        "/api/apartments/history?regionCode=11680&aptName=A&months=twelve",
        "/api/apartments/search?regionCode=11680",
        "/api/apartments/search?keyword=A&months=3",
    ];
    for uri in uris {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "BAD_REQUEST", "{}", uri);
        assert!(body["error"]["message"].is_string());
    }

    assert_eq!(provider.calls(), 0);
}

// =============================================================================
// Single month
// =============================================================================

#[tokio::test]
async fn test_single_month_response() {
    let provider = sample_provider();
    let app = setup_app(provider.clone(), None);
    let uri = "/api/apartments?regionCode=11680&yearMonth=202403";

    let (status, body) = get(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["regionCode"], "11680");
    assert_eq!(body["yearMonth"], "202403");
    assert_eq!(body["totalCount"], 3);

    let apartments = body["apartments"].as_array().unwrap();
    assert_eq!(apartments.len(), 2);
    assert_eq!(apartments[0]["aptName"], "래미안");
    assert_eq!(apartments[0]["dong"], "역삼동");
    assert_eq!(apartments[0]["jibun"], "123");
    assert_eq!(apartments[0]["buildYear"], 2005);
    assert_eq!(apartments[0]["stats"]["average"], 96_000);
    assert_eq!(apartments[0]["averagePriceLabel"], "9억 6,000만");
    assert_eq!(apartments[0]["transactions"][0]["price"], 95_000);
    assert_eq!(apartments[0]["transactions"][0]["dealDay"], 2);

    assert_eq!(body["summary"]["transactionCount"], 3);
    assert_eq!(body["summary"]["propertyCount"], 2);
    assert_eq!(body["summary"]["prices"]["max"], 120_000);

    let (status, _) = get(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_upstream_format_error_is_502_with_snippet() {
    let provider = Arc::new(MockProvider::new(Behavior::Payload(
        "<OpenAPI_ServiceResponse><cmmMsgHeader><errMsg>SERVICE ERROR</errMsg>\
         <returnAuthMsg>SERVICE_KEY_IS_NOT_REGISTERED_ERROR</returnAuthMsg>\
         </cmmMsgHeader></OpenAPI_ServiceResponse>"
            .to_string(),
    )));
    let app = setup_app(provider, None);

    let (status, body) = get(&app, "/api/apartments?regionCode=11680&yearMonth=202403").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_FORMAT_ERROR");
    assert!(body["error"]["detail"]
        .as_str()
        .unwrap()
        .starts_with("<OpenAPI_ServiceResponse>"));
}

#[tokio::test]
async fn test_upstream_fetch_error_is_500() {
    let app = setup_app(Arc::new(MockProvider::new(Behavior::Fail)), None);

    let (status, body) = get(&app, "/api/apartments?regionCode=11680&yearMonth=202403").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "UPSTREAM_FETCH_ERROR");
}

// =============================================================================
// History and search
// =============================================================================

#[tokio::test]
async fn test_history_response() {
    let provider = Arc::new(
        MockProvider::empty()
            .with_month(
                "202403",
                Behavior::Payload(json_payload(&[
                    item("래미안", "123", "100,000", (2024, 3, 20), 2005),
                    item("자이", "7", "120,000", (2024, 3, 9), 2018),
                ])),
            )
            .with_month(
                "202402",
                Behavior::Payload(json_payload(&[item("래미안", "123", "80,000", (2024, 2, 1), 2005)])),
            )
            .with_month("202401", Behavior::Fail),
    );
    let app = setup_app(provider, None);
    let uri = format!(
        "/api/apartments/history?regionCode=11680&aptName={}&months=3",
        encode("래미안")
    );

    let (status, body) = get(&app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aptName"], "래미안");
    assert_eq!(body["regionCode"], "11680");
    assert_eq!(body["totalCount"], 2);
    assert_eq!(body["partialFailureCount"], 1);
    assert_eq!(body["priceChangeRate"], 25.0);

    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions[0]["dealMonth"], 2);
    assert_eq!(transactions[1]["dealMonth"], 3);
}

#[tokio::test]
async fn test_search_response() {
    let app = setup_app(sample_provider(), None);
    let uri = format!(
        "/api/apartments/search?regionCode=11680&keyword={}&months=2",
        encode("래미")
    );

    let (status, body) = get(&app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keyword"], "래미");
    assert_eq!(body["partialFailureCount"], 0);

    // Same complex in both months merges into one entry
    let apartments = body["apartments"].as_array().unwrap();
    assert_eq!(apartments.len(), 1);
    assert_eq!(body["totalCount"], 4);
    assert_eq!(body["summary"]["propertyCount"], 1);

    let transactions = apartments[0]["transactions"].as_array().unwrap();
    assert_eq!(transactions[0]["dealDay"], 20);
    assert_eq!(transactions[3]["dealDay"], 2);
}

// =============================================================================
// Geocoding
// =============================================================================

#[tokio::test]
async fn test_geocode_without_key_is_503() {
    let app = setup_app(sample_provider(), None);

    let (status, body) = get(&app, "/api/geocode?query=abc").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "UNAVAILABLE");
}

#[tokio::test]
async fn test_geocode_requires_query() {
    let app = setup_app(sample_provider(), Some(Arc::new(OneAddressGeocoder)));

    let (status, _) = get(&app, "/api/geocode").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_geocode_address() {
    let app = setup_app(sample_provider(), Some(Arc::new(OneAddressGeocoder)));
    let uri = format!("/api/geocode?query={}", encode("서울특별시 강남구 역삼동"));

    let (status, body) = get(&app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    let addresses = body["addresses"].as_array().unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0]["x"], 127.036);
    assert_eq!(addresses[0]["y"], 37.5);
    assert_eq!(addresses[0]["jibunAddress"], "서울 강남구 역삼동");
}

#[tokio::test]
async fn test_geocode_property_falls_back_to_dong() {
    let app = setup_app(sample_provider(), Some(Arc::new(OneAddressGeocoder)));
    let uri = format!(
        "/api/geocode/property?district={}&dong={}&jibun=999",
        encode("서울특별시 강남구"),
        encode("역삼동")
    );

    let (status, body) = get(&app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], true);
    assert_eq!(body["point"]["y"], 37.5);

    let uri = format!(
        "/api/geocode/property?district={}&dong={}",
        encode("부산광역시 해운대구"),
        encode("우동")
    );
    let (status, body) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], false);
    assert!(body.get("point").is_none());
}
