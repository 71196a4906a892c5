//! Henry Hub Core: daily natural-gas spot prices, fetched incrementally and
//! enriched with descriptive columns.
//!
//! This crate contains the whole update pipeline:
//! - Domain types (price records, direction flags, the enriched dataset)
//! - Paginated fetcher with an injectable retry policy
//! - Incremental merger keyed on an explicit cutoff date
//! - Derived-column engine (weekday, % change, flag, run, reversal)
//! - CSV store with atomic writes and a metadata sidecar

pub mod config;
pub mod data;
pub mod domain;
pub mod pipeline;

pub use config::{Config, ConfigError};
pub use domain::{Dataset, Direction, EnrichedRecord, PriceRecord};
pub use pipeline::{run_update, ExistingSource, PipelineError, RunReport, UpdateOptions};
