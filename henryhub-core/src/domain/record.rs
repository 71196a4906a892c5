//! Price records: the fundamental data unit.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spot price for a single trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub price: f64,
}

impl PriceRecord {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// Direction of a day's move relative to the prior day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    /// Classify a (rounded) percentage change.
    ///
    /// A missing change compares as neither greater nor less than zero, so
    /// the first record of a series is always `Flat`.
    pub fn from_change(change: Option<f64>) -> Self {
        match change {
            Some(c) if c > 0.0 => Direction::Up,
            Some(c) if c < 0.0 => Direction::Down,
            _ => Direction::Flat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Flat => "FLAT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True iff the pair of consecutive flags is UP→DOWN or DOWN→UP.
pub fn is_reversal(prev: Direction, cur: Direction) -> bool {
    matches!(
        (prev, cur),
        (Direction::Up, Direction::Down) | (Direction::Down, Direction::Up)
    )
}

/// Full English weekday name (`Monday` .. `Sunday`).
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// A price record plus the columns derived from its position in the series.
///
/// Derived fields are only meaningful relative to the full date-sorted
/// series they were computed over; they are never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub date: NaiveDate,
    pub price: f64,
    pub day_of_week: Weekday,
    /// `None` for the first record of a series.
    pub percentage_change: Option<f64>,
    pub flag: Direction,
    /// Consecutive records, ending at this one, sharing `flag`. Always >= 1.
    pub run: u32,
    pub reversal: bool,
}

impl EnrichedRecord {
    pub fn day_name(&self) -> &'static str {
        weekday_name(self.day_of_week)
    }

    pub fn base(&self) -> PriceRecord {
        PriceRecord::new(self.date, self.price)
    }
}
