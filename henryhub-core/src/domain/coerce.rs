//! Lenient parsing of dates and prices from remote JSON and stored text.
//!
//! Rows that fail to parse are dropped, not fatal. Callers count the drops in
//! a [`DropReport`] and log them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parse an ISO calendar date, tolerating a trailing time component
/// (`2024-01-10 00:00:00` or `2024-01-10T00:00:00`).
pub fn parse_period(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = match s.char_indices().nth(10) {
        Some((i, ' ')) | Some((i, 'T')) => &s[..i],
        _ => s,
    };
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Parse a price from text. Empty, non-numeric and non-finite values are
/// rejected.
pub fn parse_price(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce a JSON value (number or numeric string) to a price.
pub fn coerce_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

/// Rows dropped during coercion, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropReport {
    pub bad_date: usize,
    pub bad_value: usize,
}

impl DropReport {
    pub fn total(&self) -> usize {
        self.bad_date + self.bad_value
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn absorb(&mut self, other: DropReport) {
        self.bad_date += other.bad_date;
        self.bad_value += other.bad_value;
    }
}
