//! Page source trait and structured error types.
//!
//! The PageSource trait abstracts over the remote API so the paginated
//! fetcher can be driven by scripted responses in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Raw entry from the remote API, before date parsing or numeric coercion.
///
/// `value` is kept as JSON because the API returns prices as strings,
/// numbers or null depending on the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub period: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl RawObservation {
    pub fn new(period: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            period: period.into(),
            value: value.into(),
        }
    }
}

/// A single failed request attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),
}

/// Errors that abort a fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page at offset {offset} failed after {attempts} attempts (last error: {last})")]
    RetriesExhausted {
        offset: usize,
        attempts: u32,
        last: AttemptError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("mirror fetch failed: {0}")]
    Mirror(String),
}

/// Parameters of one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub offset: usize,
    pub length: usize,
    /// Lower bound passed through to the remote. May be inclusive.
    pub start: Option<NaiveDate>,
}

/// Trait for remote page sources.
///
/// `get_page` performs exactly one request and returns the body of a
/// successful response. Retrying is the fetcher's job.
pub trait PageSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn get_page(&self, query: &PageQuery) -> Result<String, AttemptError>;
}

/// Why pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageEnd {
    /// A page came back with fewer records than requested.
    ShortPage,
    /// The body lacked the `response.data` envelope. Treated as "no more
    /// data", but it can also mean the remote format changed.
    MissingEnvelope,
}

impl fmt::Display for PageEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageEnd::ShortPage => f.write_str("last page"),
            PageEnd::MissingEnvelope => f.write_str("missing response envelope"),
        }
    }
}

/// Result of a complete paginated fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub observations: Vec<RawObservation>,
    pub pages: usize,
    pub end: PageEnd,
    /// Entries inside the envelope that were not `{period, value}` objects.
    pub skipped_entries: usize,
}

/// Progress callback for paginated fetches.
pub trait FetchProgress {
    /// Called after each page is received.
    fn on_page(&self, offset: usize, received: usize, total: usize);

    /// Called after a failed attempt that will be retried.
    fn on_retry(&self, offset: usize, attempt: u32, max_attempts: u32, error: &AttemptError);

    /// Called once pagination has stopped.
    fn on_finish(&self, outcome: &FetchOutcome);
}

/// Progress reporter that writes through `tracing`.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_page(&self, offset: usize, received: usize, total: usize) {
        info!(offset, received, total, "fetched page");
    }

    fn on_retry(&self, offset: usize, attempt: u32, max_attempts: u32, error: &AttemptError) {
        warn!(offset, attempt, max_attempts, %error, "page request failed, retrying");
    }

    fn on_finish(&self, outcome: &FetchOutcome) {
        match outcome.end {
            PageEnd::ShortPage => info!(
                pages = outcome.pages,
                records = outcome.observations.len(),
                "fetch complete"
            ),
            PageEnd::MissingEnvelope => warn!(
                pages = outcome.pages,
                records = outcome.observations.len(),
                "no more data or response format has changed; stopping early"
            ),
        }
        if outcome.skipped_entries > 0 {
            warn!(skipped = outcome.skipped_entries, "skipped malformed entries");
        }
    }
}

/// Progress reporter that does nothing.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_page(&self, _offset: usize, _received: usize, _total: usize) {}

    fn on_retry(&self, _offset: usize, _attempt: u32, _max: u32, _error: &AttemptError) {}

    fn on_finish(&self, _outcome: &FetchOutcome) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_observation_accepts_string_number_and_missing_value() {
        let rows: Vec<RawObservation> = serde_json::from_str(
            r#"[{"period":"2024-01-10","value":"2.5"},
                {"period":"2024-01-11","value":2.6,"series":"RNGWHHD"},
                {"period":"2024-01-12"}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].value, serde_json::json!("2.5"));
        assert_eq!(rows[1].value, serde_json::json!(2.6));
        assert!(rows[2].value.is_null());
    }

    #[test]
    fn fetch_error_message_names_offset_and_cause() {
        let err = FetchError::RetriesExhausted {
            offset: 5000,
            attempts: 5,
            last: AttemptError::Status(503),
        };
        let msg = err.to_string();
        assert!(msg.contains("5000"));
        assert!(msg.contains("HTTP 503"));
    }
}
