//! Property aggregator
//!
//! Groups canonical records by [`PropertyKey`], keeping groups in first-seen
//! order. The first record of a group decides its build year and region code;
//! later disagreeing records are upstream noise and do not overwrite them.
//! No rollups are computed here.

use remt_common::{PropertyAggregate, PropertyKey};
use std::collections::HashMap;

use super::NormalizedRecord;

/// Insertion-ordered grouping table
#[derive(Debug, Default)]
struct Groups {
    index: HashMap<PropertyKey, usize>,
    aggregates: Vec<PropertyAggregate>,
}

impl Groups {
    /// Group for `key`, created from `seed` on first sight
    fn entry(&mut self, key: &PropertyKey, seed: impl FnOnce() -> PropertyAggregate) -> &mut PropertyAggregate {
        let slot = match self.index.get(key) {
            Some(slot) => *slot,
            None => {
                self.aggregates.push(seed());
                let slot = self.aggregates.len() - 1;
                self.index.insert(key.clone(), slot);
                slot
            }
        };
        &mut self.aggregates[slot]
    }

    fn into_vec(self) -> Vec<PropertyAggregate> {
        self.aggregates
    }
}

/// Group normalized records of one fetch cycle
pub fn aggregate(records: impl IntoIterator<Item = NormalizedRecord>) -> Vec<PropertyAggregate> {
    let mut groups = Groups::default();
    for record in records {
        let NormalizedRecord { transaction, key, meta } = record;
        groups
            .entry(&key, || PropertyAggregate::new(key.clone(), meta.build_year, meta.region_code))
            .transactions
            .push(transaction);
    }
    groups.into_vec()
}

/// Merge aggregates that share a key, e.g. the same complex seen in
/// several months
///
/// Same first-seen rules as [`aggregate`]; transaction sequences are
/// concatenated in input order.
pub fn regroup(aggregates: impl IntoIterator<Item = PropertyAggregate>) -> Vec<PropertyAggregate> {
    let mut groups = Groups::default();
    for aggregate in aggregates {
        let PropertyAggregate {
            key,
            build_year,
            region_code,
            transactions,
        } = aggregate;
        groups
            .entry(&key, || PropertyAggregate::new(key.clone(), build_year, region_code))
            .transactions
            .extend(transactions);
    }
    groups.into_vec()
}
