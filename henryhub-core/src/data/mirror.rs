//! Remote raw-file mirror of the published table.
//!
//! Used instead of the local file when the run should start from whatever
//! was last pushed, e.g. on a fresh machine.

use super::provider::FetchError;
use super::store::{read_base, LoadedTable};
use std::time::Duration;
use tracing::info;

/// Download the published table and read its base columns.
pub fn fetch_mirror(url: &str, timeout: Duration) -> Result<LoadedTable, FetchError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))?;

    let resp = client
        .get(url)
        .send()
        .map_err(|e| FetchError::Mirror(format!("{url}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Mirror(format!("{url}: HTTP {status}")));
    }

    let body = resp
        .text()
        .map_err(|e| FetchError::Mirror(format!("{url}: failed to read body: {e}")))?;
    let table = read_base(body.as_bytes())
        .map_err(|e| FetchError::Mirror(format!("{url}: {e}")))?;

    info!(url, rows = table.records.len(), "loaded existing data from mirror");
    Ok(table)
}
