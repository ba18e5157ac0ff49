//! Apartment trade report client
//!
//! Talks to the public apartment trade report service (data.go.kr). The
//! payload is returned as text because the service answers in XML or JSON
//! depending on key type and request; classification is the decoder's job.

use async_trait::async_trait;
use remt_common::config::UpstreamConfig;
use remt_common::YearMonth;
use std::time::Duration;
use tracing::debug;

use crate::error::ServiceError;

/// Source of raw transaction report payloads
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// Fetch one page of reports for a region and month
    async fn fetch(
        &self,
        region_code: &str,
        year_month: YearMonth,
        page: u32,
        page_size: u32,
    ) -> Result<String, ServiceError>;
}

/// data.go.kr apartment trade report client
pub struct DataGoKrClient {
    http_client: reqwest::Client,
    base_url: String,
    service_key: Option<String>,
}

impl DataGoKrClient {
    pub fn new(
        base_url: impl Into<String>,
        service_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::fetch(format!("Failed to build HTTP client: {}", e), ""))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            service_key,
        })
    }

    /// Build from configuration and an already-resolved service key
    pub fn from_config(config: &UpstreamConfig, service_key: Option<String>) -> Result<Self, ServiceError> {
        Self::new(config.base_url.clone(), service_key, config.timeout())
    }
}

#[async_trait]
impl TransactionProvider for DataGoKrClient {
    async fn fetch(
        &self,
        region_code: &str,
        year_month: YearMonth,
        page: u32,
        page_size: u32,
    ) -> Result<String, ServiceError> {
        let deal_ymd = year_month.to_string();
        let page = page.to_string();
        let rows = page_size.to_string();

        debug!(
            region = %region_code,
            year_month = %deal_ymd,
            page = %page,
            rows = %rows,
            "Requesting trade reports"
        );

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("serviceKey", self.service_key.as_deref().unwrap_or_default()),
                ("LAWD_CD", region_code),
                ("DEAL_YMD", deal_ymd.as_str()),
                ("pageNo", page.as_str()),
                ("numOfRows", rows.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "request failed" };
                ServiceError::fetch(format!("Trade report request {}: {}", kind, e), "")
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::fetch(format!("Failed to read trade report body: {}", e), ""))?;

        if !status.is_success() {
            return Err(ServiceError::fetch(
                format!("Trade report service returned HTTP {}", status.as_u16()),
                &body,
            ));
        }

        Ok(body)
    }
}
