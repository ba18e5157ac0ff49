//! Canonical transaction model
//!
//! Upstream records of every shape are normalized into these types. JSON field
//! names follow the camelCase convention the map UI consumes.

use serde::{Deserialize, Serialize};

/// Contract date of a transaction
///
/// No calendar validation is performed: a malformed upstream date is kept as-is
/// and only participates in ordering through [`DealDate::sort_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealDate {
    #[serde(rename = "dealYear")]
    pub year: i32,
    #[serde(rename = "dealMonth")]
    pub month: i32,
    #[serde(rename = "dealDay")]
    pub day: i32,
}

impl DealDate {
    pub fn new(year: i32, month: i32, day: i32) -> Self {
        Self { year, month, day }
    }

    /// `year*10000 + month*100 + day`
    pub fn sort_key(&self) -> i64 {
        i64::from(self.year) * 10_000 + i64::from(self.month) * 100 + i64::from(self.day)
    }
}

/// One reported sale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Price in units of 10,000 KRW (만원)
    pub price: i64,
    /// Exclusive-use area in square meters, never negative
    pub area: f64,
    /// Floor number, negative for basement units
    pub floor: i32,
    #[serde(flatten)]
    pub deal_date: DealDate,
}

impl Transaction {
    pub fn sort_key(&self) -> i64 {
        self.deal_date.sort_key()
    }
}

/// Grouping identity of a property: building name, legal dong and lot number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyKey {
    pub apt_name: String,
    pub dong: String,
    pub jibun: String,
}

impl PropertyKey {
    /// Build a key from untrimmed parts
    pub fn new(apt_name: &str, dong: &str, jibun: &str) -> Self {
        Self {
            apt_name: apt_name.trim().to_string(),
            dong: dong.trim().to_string(),
            jibun: jibun.trim().to_string(),
        }
    }

    /// Case-sensitive substring match on the building name
    pub fn name_contains(&self, needle: &str) -> bool {
        self.apt_name.contains(needle)
    }
}

/// All transactions observed for one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAggregate {
    #[serde(flatten)]
    pub key: PropertyKey,
    /// Build year of the first record seen for this key
    pub build_year: i32,
    /// Region code of the first record seen for this key
    pub region_code: String,
    pub transactions: Vec<Transaction>,
}

impl PropertyAggregate {
    pub fn new(key: PropertyKey, build_year: i32, region_code: impl Into<String>) -> Self {
        Self {
            key,
            build_year,
            region_code: region_code.into(),
            transactions: Vec::new(),
        }
    }

    /// Price statistics over this property's transactions
    pub fn price_summary(&self) -> Option<PriceSummary> {
        PriceSummary::from_transactions(&self.transactions)
    }

    /// Stable sort, oldest deal first
    pub fn sort_ascending(&mut self) {
        self.transactions.sort_by_key(Transaction::sort_key);
    }

    /// Stable sort, most recent deal first
    pub fn sort_descending(&mut self) {
        self.transactions
            .sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
    }
}

/// Price statistics for one group of transactions
///
/// The average is the population (unweighted) mean rounded half away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub count: usize,
    pub average: i64,
    pub max: i64,
    pub min: i64,
}

impl PriceSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Option<Self> {
        Self::from_prices(transactions.iter().map(|t| t.price))
    }

    fn from_prices(prices: impl Iterator<Item = i64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0i128;
        let mut max = i64::MIN;
        let mut min = i64::MAX;
        for price in prices {
            count += 1;
            sum += i128::from(price);
            max = max.max(price);
            min = min.min(price);
        }
        if count == 0 {
            return None;
        }
        let average = (sum as f64 / count as f64).round() as i64;
        Some(Self {
            count,
            average,
            max,
            min,
        })
    }
}

/// Headline statistics for a result set of many properties
///
/// Zero prices and areas are treated as missing data and excluded from the
/// price and area figures, but still count as transactions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub transaction_count: usize,
    pub property_count: usize,
    pub prices: Option<PriceSummary>,
    /// Mean exclusive area in m², one decimal place
    pub average_area: Option<f64>,
}

impl MarketSummary {
    pub fn from_aggregates(aggregates: &[PropertyAggregate]) -> Self {
        let all = || aggregates.iter().flat_map(|a| a.transactions.iter());

        let prices = PriceSummary::from_prices(all().map(|t| t.price).filter(|p| *p > 0));

        let areas: Vec<f64> = all().map(|t| t.area).filter(|a| *a > 0.0).collect();
        let average_area = if areas.is_empty() {
            None
        } else {
            let mean = areas.iter().sum::<f64>() / areas.len() as f64;
            Some((mean * 10.0).round() / 10.0)
        };

        Self {
            transaction_count: all().count(),
            property_count: aggregates.len(),
            prices,
            average_area,
        }
    }
}
