//! Dataset: the ordered, enriched series persisted between runs.

use super::record::{Direction, EnrichedRecord, PriceRecord};
use chrono::NaiveDate;

/// An ordered sequence of enriched records with strictly increasing dates.
///
/// Only `pipeline::derive` builds a `Dataset`, so the ordering and the
/// derived columns are always consistent with the full series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<EnrichedRecord>,
}

/// Short description of a dataset for status output.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub last_price: Option<f64>,
    pub last_flag: Option<Direction>,
    pub last_run: Option<u32>,
}

impl Dataset {
    pub(crate) fn from_sorted(records: Vec<EnrichedRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].date < w[1].date));
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent date in the dataset (the cutoff for the next fetch).
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// The (date, price) projection used to recompute derived columns.
    pub fn base_records(&self) -> Vec<PriceRecord> {
        self.records.iter().map(EnrichedRecord::base).collect()
    }

    /// Records strictly after `date`, in order.
    pub fn rows_after(&self, date: Option<NaiveDate>) -> &[EnrichedRecord] {
        match date {
            None => &self.records,
            Some(d) => {
                let start = self.records.partition_point(|r| r.date <= d);
                &self.records[start..]
            }
        }
    }

    pub fn summary(&self) -> DatasetSummary {
        let last = self.records.last();
        DatasetSummary {
            rows: self.records.len(),
            first_date: self.records.first().map(|r| r.date),
            last_date: last.map(|r| r.date),
            last_price: last.map(|r| r.price),
            last_flag: last.map(|r| r.flag),
            last_run: last.map(|r| r.run),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::derive::derive_dataset;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn empty_dataset_has_no_cutoff() {
        let ds = Dataset::empty();
        assert!(ds.is_empty());
        assert_eq!(ds.last_date(), None);
        assert_eq!(ds.summary().rows, 0);
    }

    #[test]
    fn rows_after_is_exclusive() {
        let ds = derive_dataset(vec![
            PriceRecord::new(d(2), 2.0),
            PriceRecord::new(d(3), 2.1),
            PriceRecord::new(d(4), 2.2),
        ]);
        let rows = ds.rows_after(Some(d(3)));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, d(4));
        assert_eq!(ds.rows_after(None).len(), 3);
        assert!(ds.rows_after(Some(d(9))).is_empty());
    }

    #[test]
    fn summary_reports_latest_row() {
        let ds = derive_dataset(vec![
            PriceRecord::new(d(2), 2.0),
            PriceRecord::new(d(3), 2.1),
            PriceRecord::new(d(4), 2.2),
        ]);
        let s = ds.summary();
        assert_eq!(s.rows, 3);
        assert_eq!(s.first_date, Some(d(2)));
        assert_eq!(s.last_date, Some(d(4)));
        assert_eq!(s.last_flag, Some(Direction::Up));
        assert_eq!(s.last_run, Some(2));
    }
}
