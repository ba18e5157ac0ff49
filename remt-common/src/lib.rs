//! # REMT Common Library
//!
//! Shared code for the REMT map services including:
//! - Canonical transaction model (transactions, property keys, aggregates)
//! - Year-month arithmetic and injectable clocks
//! - Price and area formatting helpers
//! - Configuration loading

pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod time;

pub use error::{Error, Result};
pub use model::{DealDate, PropertyAggregate, PropertyKey, Transaction};
pub use time::{Clock, ManualClock, SystemClock, YearMonth};
