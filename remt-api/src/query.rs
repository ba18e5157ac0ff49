//! Multi-window query engine
//!
//! Answers the three query modes on top of the window cache:
//! - **single month**: one window, unfiltered, errors surface
//! - **history**: one building name over up to 60 months, transactions
//!   flattened and sorted oldest first
//! - **search**: a keyword over up to 12 months, regrouped per property with
//!   each property's transactions sorted newest first
//!
//! Multi-window modes fan out one task per month. A month that fails or times
//! out contributes nothing and is reported as a [`WindowFailure`]; the query
//! as a whole still succeeds.

use chrono::FixedOffset;
use futures::future::join_all;
use remt_common::{Clock, PropertyAggregate, Transaction, YearMonth};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, WindowCache, WindowKey};
use crate::error::ServiceError;
use crate::pipeline::{process_payload, regroup};
use crate::services::TransactionProvider;

pub const DEFAULT_HISTORY_MONTHS: u32 = 12;
pub const MAX_HISTORY_MONTHS: u32 = 60;
pub const DEFAULT_SEARCH_MONTHS: u32 = 6;
pub const MAX_SEARCH_MONTHS: u32 = 12;

// ============================================================================
// Query inputs
// ============================================================================

/// Trimmed value of a required parameter
pub(crate) fn required(name: &str, value: Option<&str>) -> Result<String, ServiceError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ServiceError::validation(format!("{} is required", name))),
    }
}

/// Region codes are administrative codes: ASCII letters and digits only
fn region_code(value: Option<&str>) -> Result<String, ServiceError> {
    let code = required("regionCode", value)?;
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ServiceError::validation(format!(
            "regionCode must be alphanumeric, got '{}'",
            code
        )));
    }
    Ok(code)
}

/// Month count, `default` when absent, clamped to `1..=max`
fn month_count(value: Option<&str>, default: u32, max: u32) -> Result<u32, ServiceError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    let months: i64 = match raw.parse() {
        Ok(months) => months,
        // Integers past i64 still clamp
        Err(_) if is_integer(raw) => {
            if raw.starts_with('-') {
                i64::MIN
            } else {
                i64::MAX
            }
        }
        Err(_) => {
            return Err(ServiceError::validation(format!(
                "months must be an integer, got '{}'",
                raw
            )))
        }
    };
    Ok(months.clamp(1, i64::from(max)) as u32)
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// One (region, month) window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthQuery {
    pub region_code: String,
    pub year_month: YearMonth,
}

impl MonthQuery {
    pub fn parse(region: Option<&str>, year_month: Option<&str>) -> Result<Self, ServiceError> {
        let region_code = region_code(region)?;
        let year_month = required("yearMonth", year_month)?.parse::<YearMonth>()?;
        Ok(Self {
            region_code,
            year_month,
        })
    }
}

/// Transaction history of buildings whose name contains `apt_name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub region_code: String,
    pub apt_name: String,
    pub months: u32,
}

impl HistoryQuery {
    pub fn parse(region: Option<&str>, apt_name: Option<&str>, months: Option<&str>) -> Result<Self, ServiceError> {
        Ok(Self {
            region_code: region_code(region)?,
            apt_name: required("aptName", apt_name)?,
            months: month_count(months, DEFAULT_HISTORY_MONTHS, MAX_HISTORY_MONTHS)?,
        })
    }
}

/// Properties whose name contains `keyword`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub region_code: String,
    pub keyword: String,
    pub months: u32,
}

impl SearchQuery {
    pub fn parse(region: Option<&str>, keyword: Option<&str>, months: Option<&str>) -> Result<Self, ServiceError> {
        Ok(Self {
            region_code: region_code(region)?,
            keyword: required("keyword", keyword)?,
            months: month_count(months, DEFAULT_SEARCH_MONTHS, MAX_SEARCH_MONTHS)?,
        })
    }
}

// ============================================================================
// Results
// ============================================================================

/// A month that contributed nothing to a multi-window result
#[derive(Debug, Clone)]
pub struct WindowFailure {
    pub year_month: YearMonth,
    pub error: ServiceError,
}

/// Flattened transactions, oldest first
#[derive(Debug, Clone)]
pub struct HistoryResult {
    pub transactions: Vec<Transaction>,
    pub failures: Vec<WindowFailure>,
}

impl HistoryResult {
    pub fn partial_failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Per-property aggregates merged across months, transactions newest first
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub aggregates: Vec<PropertyAggregate>,
    pub failures: Vec<WindowFailure>,
}

impl SearchResult {
    pub fn partial_failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Fan-in of one multi-window query, successes in month order
struct WindowSet {
    entries: Vec<CacheEntry>,
    failures: Vec<WindowFailure>,
}

impl WindowSet {
    fn matching<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = &'a PropertyAggregate> + 'a {
        self.entries
            .iter()
            .flat_map(|entry| entry.aggregates.iter())
            .filter(move |aggregate| aggregate.key.name_contains(needle))
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Engine tunables
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Rows requested from page 1 of each window
    pub page_size: u32,
    /// Bound on each upstream call
    pub fetch_timeout: Duration,
    /// Offset deciding which month is current
    pub utc_offset: FixedOffset,
}

/// Query engine; cheap to clone, clones share the cache and provider
#[derive(Clone)]
pub struct QueryEngine {
    provider: Arc<dyn TransactionProvider>,
    cache: Arc<WindowCache>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl QueryEngine {
    pub fn new(
        provider: Arc<dyn TransactionProvider>,
        cache: Arc<WindowCache>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            clock,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<WindowCache> {
        &self.cache
    }

    /// One window, straight from the cache or a fresh fetch
    pub async fn single_month(&self, query: &MonthQuery) -> Result<CacheEntry, ServiceError> {
        let key = WindowKey::new(query.region_code.clone(), query.year_month);
        let entry = self.fetch_window(key).await?;
        info!(
            window = %entry.key,
            properties = entry.aggregates.len(),
            records = entry.total_raw_record_count,
            "Single-month query complete"
        );
        Ok(entry)
    }

    /// Every transaction of matching buildings over the last `months` months
    pub async fn history(&self, query: &HistoryQuery) -> HistoryResult {
        let windows = self.fan_out(&query.region_code, query.months).await;

        let mut transactions: Vec<Transaction> = windows
            .matching(&query.apt_name)
            .flat_map(|aggregate| aggregate.transactions.iter().cloned())
            .collect();
        transactions.sort_by_key(Transaction::sort_key);

        info!(
            region = %query.region_code,
            apt_name = %query.apt_name,
            months = query.months,
            transactions = transactions.len(),
            failed_months = windows.failures.len(),
            "History query complete"
        );

        HistoryResult {
            transactions,
            failures: windows.failures,
        }
    }

    /// Matching properties over the last `months` months, merged per property
    pub async fn search(&self, query: &SearchQuery) -> SearchResult {
        let windows = self.fan_out(&query.region_code, query.months).await;

        let mut aggregates = regroup(windows.matching(&query.keyword).cloned());
        for aggregate in &mut aggregates {
            aggregate.sort_descending();
        }

        info!(
            region = %query.region_code,
            keyword = %query.keyword,
            months = query.months,
            properties = aggregates.len(),
            failed_months = windows.failures.len(),
            "Search query complete"
        );

        SearchResult {
            aggregates,
            failures: windows.failures,
        }
    }

    /// Fetch the `months` most recent windows concurrently
    ///
    /// Each window runs on its own task, so a caller that goes away does not
    /// cancel fetches already in flight; their results still land in the
    /// cache.
    async fn fan_out(&self, region_code: &str, months: u32) -> WindowSet {
        let recent = YearMonth::recent(self.clock.now(), self.settings.utc_offset, months);
        debug!(region = %region_code, months = recent.len(), "Fanning out window fetches");

        let handles = recent.iter().map(|year_month| {
            let engine = self.clone();
            let key = WindowKey::new(region_code, *year_month);
            tokio::spawn(async move { engine.fetch_window(key).await })
        });
        let joined = join_all(handles).await;

        let mut entries = Vec::with_capacity(joined.len());
        let mut failures = Vec::new();
        for (year_month, outcome) in recent.into_iter().zip(joined) {
            let error = match outcome {
                Ok(Ok(entry)) => {
                    entries.push(entry);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) => ServiceError::fetch(format!("Window task failed: {}", e), ""),
            };
            warn!(
                region = %region_code,
                year_month = %year_month,
                error = %error,
                "Skipping month after failed fetch"
            );
            failures.push(WindowFailure { year_month, error });
        }

        WindowSet { entries, failures }
    }

    /// Cache lookup backed by a bounded upstream call and the pipeline
    async fn fetch_window(&self, key: WindowKey) -> Result<CacheEntry, ServiceError> {
        let provider = Arc::clone(&self.provider);
        let EngineSettings {
            page_size,
            fetch_timeout,
            ..
        } = self.settings;
        let region_code = key.region_code.clone();
        let year_month = key.year_month;

        self.cache
            .get_or_fetch(&key, || async move {
                let payload = tokio::time::timeout(
                    fetch_timeout,
                    provider.fetch(&region_code, year_month, 1, page_size),
                )
                .await
                .map_err(|_| {
                    ServiceError::fetch(
                        format!(
                            "Upstream call for {}_{} timed out after {}s",
                            region_code,
                            year_month,
                            fetch_timeout.as_secs_f64()
                        ),
                        "",
                    )
                })??;
                process_payload(&payload, &region_code)
            })
            .await
    }
}
