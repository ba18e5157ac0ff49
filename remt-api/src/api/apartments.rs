//! Apartment transaction endpoints
//!
//! Parameters are extracted as raw strings and validated by the query
//! constructors, so a malformed request is rejected with 400 before the cache
//! or the provider is touched.

use axum::{
    extract::{Query, State},
    Json,
};
use remt_common::format::{change_rate, format_price, sqm_to_pyeong};
use remt_common::model::{MarketSummary, PriceSummary};
use remt_common::{PropertyAggregate, Transaction};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::query::{HistoryQuery, MonthQuery, SearchQuery};
use crate::AppState;

/// Query parameters for GET /api/apartments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthParams {
    pub region_code: Option<String>,
    pub year_month: Option<String>,
}

/// Query parameters for GET /api/apartments/history
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub region_code: Option<String>,
    pub apt_name: Option<String>,
    pub months: Option<String>,
}

/// Query parameters for GET /api/apartments/search
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub region_code: Option<String>,
    pub keyword: Option<String>,
    pub months: Option<String>,
}

/// One property with its price statistics
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentView {
    #[serde(flatten)]
    pub aggregate: PropertyAggregate,
    pub stats: Option<PriceSummary>,
    /// e.g. `"9억 5,000만"`
    pub average_price_label: Option<String>,
    /// Mean exclusive area in 평, ignoring zero areas
    pub average_pyeong: Option<f64>,
}

impl From<PropertyAggregate> for ApartmentView {
    fn from(aggregate: PropertyAggregate) -> Self {
        let stats = aggregate.price_summary();
        let areas: Vec<f64> = aggregate
            .transactions
            .iter()
            .map(|t| t.area)
            .filter(|a| *a > 0.0)
            .collect();
        let average_pyeong =
            (!areas.is_empty()).then(|| sqm_to_pyeong(areas.iter().sum::<f64>() / areas.len() as f64));

        Self {
            average_price_label: stats.map(|s| format_price(s.average)),
            average_pyeong,
            stats,
            aggregate,
        }
    }
}

/// Percent change from the oldest to the newest priced transaction
fn history_change_rate(ascending: &[Transaction]) -> Option<f64> {
    let mut priced = ascending.iter().filter(|t| t.price > 0);
    let first = priced.next()?;
    let last = priced.last()?;
    change_rate(last.price, first.price)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthResponse {
    pub apartments: Vec<ApartmentView>,
    /// Records the provider returned for the month
    pub total_count: usize,
    pub region_code: String,
    pub year_month: String,
    pub summary: MarketSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub apt_name: String,
    pub region_code: String,
    pub transactions: Vec<Transaction>,
    pub total_count: usize,
    /// Oldest to newest priced transaction, percent
    pub price_change_rate: Option<f64>,
    /// Months skipped because their fetch failed
    pub partial_failure_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub keyword: String,
    pub region_code: String,
    pub apartments: Vec<ApartmentView>,
    /// Matching transactions across all returned apartments
    pub total_count: usize,
    pub partial_failure_count: usize,
    pub summary: MarketSummary,
}

/// GET /api/apartments?regionCode=11680&yearMonth=202403
pub async fn get_month(
    State(state): State<AppState>,
    Query(params): Query<MonthParams>,
) -> ApiResult<Json<MonthResponse>> {
    let query = MonthQuery::parse(params.region_code.as_deref(), params.year_month.as_deref())?;
    let entry = state.engine.single_month(&query).await?;

    let aggregates = entry.aggregates.as_ref();
    Ok(Json(MonthResponse {
        summary: MarketSummary::from_aggregates(aggregates),
        apartments: aggregates.iter().cloned().map(ApartmentView::from).collect(),
        total_count: entry.total_raw_record_count,
        region_code: query.region_code,
        year_month: query.year_month.to_string(),
    }))
}

/// GET /api/apartments/history?regionCode=11680&aptName=래미안&months=36
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let query = HistoryQuery::parse(
        params.region_code.as_deref(),
        params.apt_name.as_deref(),
        params.months.as_deref(),
    )?;
    let result = state.engine.history(&query).await;

    Ok(Json(HistoryResponse {
        total_count: result.transactions.len(),
        price_change_rate: history_change_rate(&result.transactions),
        partial_failure_count: result.partial_failure_count(),
        transactions: result.transactions,
        apt_name: query.apt_name,
        region_code: query.region_code,
    }))
}

/// GET /api/apartments/search?regionCode=11680&keyword=자이&months=6
pub async fn get_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let query = SearchQuery::parse(
        params.region_code.as_deref(),
        params.keyword.as_deref(),
        params.months.as_deref(),
    )?;
    let result = state.engine.search(&query).await;

    let summary = MarketSummary::from_aggregates(&result.aggregates);
    let partial_failure_count = result.partial_failure_count();
    Ok(Json(SearchResponse {
        keyword: query.keyword,
        region_code: query.region_code,
        total_count: summary.transaction_count,
        apartments: result.aggregates.into_iter().map(ApartmentView::from).collect(),
        partial_failure_count,
        summary,
    }))
}
