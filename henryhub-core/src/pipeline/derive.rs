//! Derived-column engine.
//!
//! Given a price series, sort it by date and compute, in a single pass:
//! weekday, percentage change from the prior record, direction flag,
//! run length and reversal flag. Derived columns are always recomputed over
//! the full series; there is no incremental update.

use crate::domain::{is_reversal, Dataset, Direction, EnrichedRecord, PriceRecord};
use chrono::Datelike;
use tracing::warn;

/// Decimal places kept on `percentage_change`.
pub const CHANGE_DECIMALS: i32 = 3;

/// Round half away from zero to `CHANGE_DECIMALS` places. Exact ties go up in
/// magnitude (`2.0625` becomes `2.063`), not to the even neighbour. Negative
/// zero is normalised so that a rounded-away move prints and classifies as `0`.
pub fn round_change(x: f64) -> f64 {
    let scale = 10f64.powi(CHANGE_DECIMALS);
    let r = (x * scale).round() / scale;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Percentage change from `prev` to `cur`, rounded.
///
/// Returns `None` when the prior price is zero or the result is not finite.
/// A zero prior price therefore gives a null change and a FLAT flag, not an
/// infinite change classified as UP.
pub fn percentage_change(prev: f64, cur: f64) -> Option<f64> {
    if prev == 0.0 {
        return None;
    }
    let pct = (cur - prev) / prev * 100.0;
    pct.is_finite().then(|| round_change(pct))
}

/// Sort by date (stable) and drop later records sharing a date.
///
/// Returns the cleaned series and the number of duplicates removed.
pub fn sort_and_dedup(mut records: Vec<PriceRecord>) -> (Vec<PriceRecord>, usize) {
    records.sort_by_key(|r| r.date);
    let before = records.len();
    records.dedup_by_key(|r| r.date);
    let removed = before - records.len();
    (records, removed)
}

/// Compute enriched records for a price series.
pub fn derive(records: Vec<PriceRecord>) -> Vec<EnrichedRecord> {
    let (records, duplicates) = sort_and_dedup(records);
    if duplicates > 0 {
        warn!(duplicates, "dropped records with duplicate dates (kept first occurrence)");
    }

    let mut out: Vec<EnrichedRecord> = Vec::with_capacity(records.len());
    for rec in records {
        let (change, flag, run, reversal) = match out.last() {
            None => (None, Direction::Flat, 1, false),
            Some(prev) => {
                let pct = percentage_change(prev.price, rec.price);
                let flag = Direction::from_change(pct);
                let run = if flag == prev.flag { prev.run + 1 } else { 1 };
                (pct, flag, run, is_reversal(prev.flag, flag))
            }
        };
        out.push(EnrichedRecord {
            date: rec.date,
            price: rec.price,
            day_of_week: rec.date.weekday(),
            percentage_change: change,
            flag,
            run,
            reversal,
        });
    }
    out
}

/// [`derive`] wrapped into a [`Dataset`].
pub fn derive_dataset(records: Vec<PriceRecord>) -> Dataset {
    Dataset::from_sorted(derive(records))
}
