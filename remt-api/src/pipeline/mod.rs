//! Transaction pipeline
//!
//! One upstream payload flows through three pure stages:
//! 1. **decoder** - payload text → raw records (XML or JSON, any shape)
//! 2. **normalizer** - raw record → canonical transaction + property key
//! 3. **aggregator** - canonical records → per-property aggregates
//!
//! None of the stages suspend; the only await point in a fetch cycle is the
//! upstream call itself.

pub mod aggregator;
pub mod decoder;
pub mod normalizer;

pub use aggregator::{aggregate, regroup};
pub use decoder::{decode, Payload};
pub use normalizer::{normalize, NormalizedRecord, RecordMeta};

use remt_common::PropertyAggregate;
use serde_json::{Map, Value};

use crate::error::ServiceError;

/// One upstream transaction record, fields still untyped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record from string pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }

    /// First present value among `keys`, as trimmed text
    ///
    /// A key is present when it holds a number, or a string that is not blank.
    pub fn first_present(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.0.get(*key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of one full fetch cycle for a (region, month) window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowFetch {
    pub aggregates: Vec<PropertyAggregate>,
    /// Records decoded before grouping
    pub total_raw_record_count: usize,
}

/// Decode, normalize and aggregate one upstream payload
pub fn process_payload(payload: &str, fallback_region: &str) -> Result<WindowFetch, ServiceError> {
    let records = decode(payload)?;
    let total_raw_record_count = records.len();
    let normalized = records.iter().map(|raw| normalize(raw, fallback_region));

    Ok(WindowFetch {
        aggregates: aggregate(normalized),
        total_raw_record_count,
    })
}
