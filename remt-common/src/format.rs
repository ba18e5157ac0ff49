//! Human-readable price and area formatting
//!
//! Prices arrive in 만원 (10,000 KRW) units. Large amounts are written with
//! 억 (100,000,000 KRW) the way listings display them.

/// Square meters per 평
pub const SQM_PER_PYEONG: f64 = 3.305785;

/// Format a 만원 amount, e.g. `95000` → `"9억 5,000만"`
pub fn format_price(price_manwon: i64) -> String {
    if price_manwon >= 10_000 {
        let eok = price_manwon / 10_000;
        let man = price_manwon % 10_000;
        if man > 0 {
            format!("{}억 {}만", eok, group_thousands(man))
        } else {
            format!("{}억", eok)
        }
    } else {
        format!("{}만", group_thousands(price_manwon))
    }
}

/// Convert square meters to 평, one decimal place
pub fn sqm_to_pyeong(sqm: f64) -> f64 {
    (sqm / SQM_PER_PYEONG * 10.0).round() / 10.0
}

/// Percent change from `previous` to `current`, one decimal place
///
/// Returns `None` when there is no usable baseline.
pub fn change_rate(current: i64, previous: i64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    let rate = (current - previous) as f64 / previous as f64 * 100.0;
    Some((rate * 10.0).round() / 10.0)
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
