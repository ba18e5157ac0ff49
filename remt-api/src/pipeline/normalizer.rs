//! Record normalizer
//!
//! Maps one raw upstream record onto the canonical model. The provider has
//! shipped two schemas over time (Korean element names, then camelCase), so
//! every logical field is described by an ordered list of accessor keys in
//! [`FIELD_TABLE`]. Normalization never fails: unparseable numbers become 0 so
//! one bad row cannot sink a month's batch.

use remt_common::{DealDate, PropertyKey, Transaction};

use super::RawRecord;

/// Accessor keys for one logical field, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: &'static str,
    pub keys: &'static [&'static str],
}

pub const APT_NAME: FieldSpec = FieldSpec { field: "aptName", keys: &["아파트", "aptNm"] };
pub const PRICE: FieldSpec = FieldSpec { field: "price", keys: &["거래금액", "dealAmount"] };
pub const AREA: FieldSpec = FieldSpec { field: "area", keys: &["전용면적", "excluUseAr"] };
pub const FLOOR: FieldSpec = FieldSpec { field: "floor", keys: &["층", "floor"] };
pub const BUILD_YEAR: FieldSpec = FieldSpec { field: "buildYear", keys: &["건축년도", "buildYear"] };
pub const DEAL_YEAR: FieldSpec = FieldSpec { field: "dealYear", keys: &["년", "dealYear"] };
pub const DEAL_MONTH: FieldSpec = FieldSpec { field: "dealMonth", keys: &["월", "dealMonth"] };
pub const DEAL_DAY: FieldSpec = FieldSpec { field: "dealDay", keys: &["일", "dealDay"] };
pub const DONG: FieldSpec = FieldSpec { field: "dong", keys: &["법정동", "umdNm"] };
pub const JIBUN: FieldSpec = FieldSpec { field: "jibun", keys: &["지번", "jibun"] };
pub const REGION_CODE: FieldSpec = FieldSpec { field: "regionCode", keys: &["지역코드", "dealingGbn"] };

/// Every field the normalizer reads
pub const FIELD_TABLE: [FieldSpec; 11] = [
    APT_NAME, PRICE, AREA, FLOOR, BUILD_YEAR, DEAL_YEAR, DEAL_MONTH, DEAL_DAY, DONG, JIBUN,
    REGION_CODE,
];

/// Per-property attributes taken from the first record of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub build_year: i32,
    pub region_code: String,
}

/// Canonical form of one upstream record
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub transaction: Transaction,
    pub key: PropertyKey,
    pub meta: RecordMeta,
}

/// Normalize one record; `fallback_region` is used when the record has no
/// region code of its own
pub fn normalize(raw: &RawRecord, fallback_region: &str) -> NormalizedRecord {
    let text = |spec: &FieldSpec| raw.first_present(spec.keys).unwrap_or_default();
    let int = |spec: &FieldSpec| parse_int(&text(spec));

    let transaction = Transaction {
        price: parse_price(&text(&PRICE)),
        area: parse_area(&text(&AREA)),
        floor: int(&FLOOR),
        deal_date: DealDate::new(int(&DEAL_YEAR), int(&DEAL_MONTH), int(&DEAL_DAY)),
    };

    let key = PropertyKey::new(&text(&APT_NAME), &text(&DONG), &text(&JIBUN));

    let region_code = raw
        .first_present(REGION_CODE.keys)
        .unwrap_or_else(|| fallback_region.trim().to_string());

    NormalizedRecord {
        transaction,
        key,
        meta: RecordMeta {
            build_year: int(&BUILD_YEAR),
            region_code,
        },
    }
}

/// `"95,000"` → `95000`; anything unparseable → 0
pub fn parse_price(text: &str) -> i64 {
    let digits: String = text.chars().filter(|c| *c != ',').collect();
    digits.trim().parse().unwrap_or(0)
}

fn parse_int(text: &str) -> i32 {
    let text = text.trim();
    text.parse::<i32>()
        .or_else(|_| text.parse::<f64>().map(|v| v as i32))
        .unwrap_or(0)
}

fn parse_area(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(area) if area.is_finite() && area > 0.0 => area,
        _ => 0.0,
    }
}
