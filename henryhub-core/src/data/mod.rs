//! Data acquisition and storage

pub mod eia;
pub mod fetch;
pub mod mirror;
pub mod provider;
pub mod retry;
pub mod store;

pub use eia::EiaSource;
pub use fetch::{PaginatedFetcher, DEFAULT_PAGE_SIZE};
pub use mirror::fetch_mirror;
pub use provider::{
    AttemptError, FetchError, FetchOutcome, FetchProgress, LogProgress, PageEnd, PageQuery,
    PageSource, RawObservation, SilentProgress,
};
pub use retry::{Backoff, RetryPolicy};
pub use store::{LoadedTable, StoreError, StoreMeta, WriteMode};
