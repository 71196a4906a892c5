//! Incremental merger.
//!
//! Keeps only fetched observations strictly after the last known date and
//! appends them to the existing series. The cutoff is an explicit argument;
//! this module never touches the filesystem.

use crate::data::provider::RawObservation;
use crate::domain::{coerce_value, parse_period, DropReport, PriceRecord};
use chrono::NaiveDate;
use tracing::{info, warn};

/// Result of merging fetched observations into an existing series.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Existing records followed by the accepted new ones. Not sorted.
    pub records: Vec<PriceRecord>,
    /// Number of fetched records appended.
    pub appended: usize,
    /// Fetched records at or before the cutoff.
    pub already_known: usize,
    /// Fetched records discarded during coercion.
    pub dropped: DropReport,
}

/// Most recent date in a series.
pub fn cutoff(existing: &[PriceRecord]) -> Option<NaiveDate> {
    existing.iter().map(|r| r.date).max()
}

/// Coerce raw observations into price records, counting what was dropped.
pub fn coerce_observations(fetched: Vec<RawObservation>) -> (Vec<PriceRecord>, DropReport) {
    let mut dropped = DropReport::default();
    let mut records = Vec::with_capacity(fetched.len());
    for obs in fetched {
        let Some(date) = parse_period(&obs.period) else {
            dropped.bad_date += 1;
            continue;
        };
        let Some(price) = coerce_value(&obs.value) else {
            dropped.bad_value += 1;
            continue;
        };
        records.push(PriceRecord::new(date, price));
    }
    (records, dropped)
}

/// Merge fetched observations into `existing`.
///
/// With no `last_known_date` every coercible record is accepted, in fetch
/// order.
pub fn merge(
    existing: Vec<PriceRecord>,
    fetched: Vec<RawObservation>,
    last_known_date: Option<NaiveDate>,
) -> MergeOutcome {
    let (candidates, dropped) = coerce_observations(fetched);
    let total = candidates.len();

    let fresh: Vec<PriceRecord> = match last_known_date {
        None => candidates,
        Some(cut) => candidates.into_iter().filter(|r| r.date > cut).collect(),
    };
    let appended = fresh.len();

    if !dropped.is_empty() {
        warn!(
            bad_date = dropped.bad_date,
            bad_value = dropped.bad_value,
            "dropped fetched rows that could not be coerced"
        );
    }
    if appended > 0 {
        info!(appended, "appending new records");
    } else {
        info!("no new data to append");
    }

    let mut records = existing;
    records.extend(fresh);

    MergeOutcome {
        records,
        appended,
        already_known: total - appended,
        dropped,
    }
}
