//! Domain types: price records, direction flags and the enriched dataset.

pub mod coerce;
pub mod dataset;
pub mod record;

pub use coerce::{coerce_value, parse_period, parse_price, DropReport};
pub use dataset::{Dataset, DatasetSummary};
pub use record::{is_reversal, weekday_name, Direction, EnrichedRecord, PriceRecord};
