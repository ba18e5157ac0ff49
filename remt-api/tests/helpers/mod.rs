//! Shared fixtures for remt-api integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use remt_api::cache::WindowCache;
use remt_api::error::ServiceError;
use remt_api::query::{EngineSettings, QueryEngine};
use remt_api::services::TransactionProvider;
use remt_common::time::offset_hours;
use remt_common::{Clock, ManualClock, YearMonth};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REGION: &str = "11680";

/// Per-call upstream timeout used by test engines
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(300);

/// What the mock provider does for one month
#[derive(Debug, Clone)]
pub enum Behavior {
    Payload(String),
    /// Respond after a delay
    Delayed(Duration, String),
    Fail,
    /// Never respond
    Hang,
}

/// Provider answering per month, counting every call
pub struct MockProvider {
    months: Mutex<HashMap<String, Behavior>>,
    fallback: Behavior,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Months without an explicit behavior answer with `fallback`
    pub fn new(fallback: Behavior) -> Self {
        Self {
            months: Mutex::new(HashMap::new()),
            fallback,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Behavior::Payload(json_payload(&[])))
    }

    pub fn with_month(self, year_month: &str, behavior: Behavior) -> Self {
        self.months.lock().unwrap().insert(year_month.to_string(), behavior);
        self
    }

    pub fn set_month(&self, year_month: &str, behavior: Behavior) {
        self.months.lock().unwrap().insert(year_month.to_string(), behavior);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requested months in call order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionProvider for MockProvider {
    async fn fetch(
        &self,
        region_code: &str,
        year_month: YearMonth,
        page: u32,
        _page_size: u32,
    ) -> Result<String, ServiceError> {
        assert_eq!(page, 1, "only page 1 is ever requested");
        assert_eq!(region_code, REGION);

        self.calls.fetch_add(1, Ordering::SeqCst);
        let month = year_month.to_string();
        self.requested.lock().unwrap().push(month.clone());

        let behavior = self
            .months
            .lock()
            .unwrap()
            .get(&month)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());

        match behavior {
            Behavior::Payload(payload) => Ok(payload),
            Behavior::Delayed(delay, payload) => {
                tokio::time::sleep(delay).await;
                Ok(payload)
            }
            Behavior::Fail => Err(ServiceError::fetch("connection refused", "")),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

/// Test engine over `provider`, clock fixed at 2024-03-15 12:00 UTC
pub fn engine(provider: Arc<MockProvider>) -> (QueryEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at(2024, 3, 15));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let cache = Arc::new(WindowCache::new(chrono::Duration::hours(1), Arc::clone(&dyn_clock)));
    let settings = EngineSettings {
        page_size: 1000,
        fetch_timeout: FETCH_TIMEOUT,
        utc_offset: offset_hours(9),
    };
    (QueryEngine::new(provider, cache, dyn_clock, settings), clock)
}

/// One camelCase-schema record
pub fn item(name: &str, jibun: &str, price: &str, date: (i32, i32, i32), build_year: i32) -> Value {
    json!({
        "aptNm": name,
        "dealAmount": price,
        "excluUseAr": "84.97",
        "floor": "10",
        "buildYear": build_year,
        "dealYear": date.0,
        "dealMonth": date.1,
        "dealDay": date.2,
        "umdNm": "역삼동",
        "jibun": jibun,
    })
}

/// JSON payload in the provider's envelope
pub fn json_payload(items: &[Value]) -> String {
    json!({
        "response": {
            "header": { "resultCode": "000", "resultMsg": "OK" },
            "body": {
                "items": { "item": items },
                "numOfRows": 1000,
                "pageNo": 1,
                "totalCount": items.len(),
            }
        }
    })
    .to_string()
}

/// XML payload in the provider's envelope, Korean element names
pub fn xml_payload(items: &[&[(&str, &str)]]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><response><header><resultCode>00</resultCode>\
         <resultMsg>NORMAL SERVICE.</resultMsg></header><body><items>",
    );
    for fields in items {
        xml.push_str("<item>");
        for (name, value) in fields.iter() {
            xml.push_str(&format!("<{0}>{1}</{0}>", name, value));
        }
        xml.push_str("</item>");
    }
    xml.push_str("</items></body></response>");
    xml
}
