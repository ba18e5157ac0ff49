//! Clocks and year-month arithmetic

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::Error;

/// Source of the current time
///
/// Components that make time-based decisions take a clock handle instead of
/// calling `Utc::now()` so tests can control expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Clock frozen at the given UTC calendar time
    pub fn at(year: i32, month: u32, day: u32) -> Self {
        let start = Utc
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
    }
}

/// Calendar month, rendered as `YYYYMM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` unless `month` is in `1..=12` and `year` has four digits
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1000..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Month containing `now`, observed at the given UTC offset
    pub fn containing(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = now.with_timezone(&offset);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    /// The month `n` months before this one
    pub fn months_back(&self, n: u32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) - n as i32;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// `count` consecutive months ending at the month containing `now`,
    /// newest first
    pub fn recent(now: DateTime<Utc>, offset: FixedOffset, count: u32) -> Vec<Self> {
        let current = Self::containing(now, offset);
        (0..count).map(|i| current.months_back(i)).collect()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || Error::InvalidInput(format!("yearMonth must be YYYYMM, got '{}'", s));

        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = s[..4].parse().map_err(|_| invalid())?;
        let month: u32 = s[4..].parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

/// Fixed UTC offset from whole hours, clamped to the valid range
pub fn offset_hours(hours: i32) -> FixedOffset {
    let hours = hours.clamp(-23, 23);
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}
