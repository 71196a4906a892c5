//! Update pipeline: load existing → fetch → merge → derive → write.
//!
//! Each run is a single pass. Nothing is retained between runs except the
//! table on disk; the cutoff date is read once at the start and threaded
//! through explicitly.

pub mod derive;
pub mod merge;

use crate::data::fetch::PaginatedFetcher;
use crate::data::mirror::fetch_mirror;
use crate::data::provider::{FetchError, PageEnd, PageSource};
use crate::data::store::{self, LoadedTable, StoreError, StoreMeta, WriteMode};
use crate::domain::{Dataset, DropReport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub use derive::{derive, derive_dataset};
pub use merge::{cutoff, merge, MergeOutcome};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed, output left unchanged: {0}")]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Where the "existing" state comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistingSource {
    /// The local table. A missing file is an empty dataset.
    Local(PathBuf),
    /// The published raw file, fetched over HTTP.
    Mirror { url: String, timeout: Duration },
}

impl ExistingSource {
    pub fn load(&self) -> Result<LoadedTable, PipelineError> {
        match self {
            ExistingSource::Local(path) => Ok(store::read_file(path)?),
            ExistingSource::Mirror { url, timeout } => Ok(fetch_mirror(url, *timeout)?),
        }
    }
}

/// How `run_update` persists the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Append new rows instead of rewriting the table.
    pub append: bool,
    /// Compute everything but write nothing.
    pub dry_run: bool,
}

/// Summary of one update run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub existing_rows: usize,
    pub cutoff: Option<chrono::NaiveDate>,
    pub fetched: usize,
    pub pages: usize,
    pub page_end: PageEnd,
    pub appended: usize,
    /// Rows dropped while reading existing data and coercing fetched data.
    pub dropped: DropReport,
    pub final_rows: usize,
    pub output: PathBuf,
    /// `None` on a dry run.
    pub meta: Option<StoreMeta>,
}

/// Run one incremental update against `target`.
///
/// A fetch failure returns before anything is written, so the last good
/// table stays in place.
pub fn run_update<S: PageSource>(
    existing: &ExistingSource,
    fetcher: &PaginatedFetcher<'_, S>,
    target: &Path,
    opts: UpdateOptions,
) -> Result<RunReport, PipelineError> {
    let LoadedTable {
        records: existing_records,
        dropped: mut dropped,
    } = existing.load()?;
    let existing_rows = existing_records.len();

    let last_known = cutoff(&existing_records);
    match last_known {
        Some(d) => info!(cutoff = %d, rows = existing_rows, "most recent date in existing data"),
        None => info!("no existing data, fetching full history"),
    }

    let fetched = fetcher.fetch_all(last_known)?;
    let fetched_count = fetched.observations.len();

    let merged = merge(existing_records, fetched.observations, last_known);
    dropped.absorb(merged.dropped);

    let dataset = derive_dataset(merged.records);

    let meta = if opts.dry_run {
        info!(rows = dataset.len(), "dry run, not writing");
        None
    } else {
        let mode = if opts.append {
            WriteMode::Append
        } else {
            WriteMode::Overwrite
        };
        Some(store::write(&dataset, target, mode)?)
    };

    Ok(RunReport {
        existing_rows,
        cutoff: last_known,
        fetched: fetched_count,
        pages: fetched.pages,
        page_end: fetched.end,
        appended: merged.appended,
        dropped,
        final_rows: dataset.len(),
        output: target.to_path_buf(),
        meta,
    })
}

/// Recompute the derived columns of a stored table and rewrite it.
pub fn rederive_file(path: &Path) -> Result<(Dataset, StoreMeta), PipelineError> {
    if !path.exists() {
        return Err(PipelineError::Store(StoreError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "table not found"),
        }));
    }
    let table = store::read_file(path)?;
    let dataset = derive_dataset(table.records);
    let meta = store::write(&dataset, path, WriteMode::Overwrite)?;
    Ok((dataset, meta))
}

/// Load a stored table as a fully derived dataset.
pub fn load_dataset(path: &Path) -> Result<Dataset, PipelineError> {
    let table = store::read_file(path)?;
    Ok(derive_dataset(table.records))
}
