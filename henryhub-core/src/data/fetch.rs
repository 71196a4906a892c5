//! Paginated fetcher.
//!
//! Requests fixed-size pages, advancing the offset by the page size, until a
//! short page or a body without the expected envelope. Each page gets a
//! bounded number of attempts; exhausting them fails the whole fetch and no
//! partial result is returned.

use super::provider::{
    FetchError, FetchOutcome, FetchProgress, LogProgress, PageEnd, PageQuery, PageSource,
    RawObservation,
};
use super::retry::{thread_sleep, RetryPolicy, Sleeper};
use chrono::NaiveDate;
use serde_json::Value;

/// Largest page the EIA API serves.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Contents of one decoded page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Page {
    Data {
        entries: Vec<RawObservation>,
        /// Number of entries in the envelope, including malformed ones.
        received: usize,
    },
    MissingEnvelope,
}

/// Decode `{"response": {"data": [...]}}`.
///
/// Anything that is not JSON or lacks the envelope is `MissingEnvelope`.
/// Entries that do not deserialize as `{period, value}` are dropped here but
/// still count toward `received`, so a full page keeps pagination going.
pub(crate) fn parse_page(body: &str) -> Page {
    let Ok(root) = serde_json::from_str::<Value>(body) else {
        return Page::MissingEnvelope;
    };
    let Some(Value::Array(data)) = root.get("response").and_then(|r| r.get("data")) else {
        return Page::MissingEnvelope;
    };
    let received = data.len();
    let entries = data
        .iter()
        .filter_map(|e| serde_json::from_value::<RawObservation>(e.clone()).ok())
        .collect();
    Page::Data { entries, received }
}

/// Drives a [`PageSource`] through every page.
pub struct PaginatedFetcher<'a, S: PageSource> {
    source: S,
    page_size: usize,
    retry: RetryPolicy,
    sleeper: Sleeper,
    progress: &'a dyn FetchProgress,
}

impl<S: PageSource> PaginatedFetcher<'static, S> {
    pub fn new(source: S, page_size: usize, retry: RetryPolicy) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            retry,
            sleeper: thread_sleep,
            progress: &LogProgress,
        }
    }
}

impl<'a, S: PageSource> PaginatedFetcher<'a, S> {
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_progress<'b>(self, progress: &'b dyn FetchProgress) -> PaginatedFetcher<'b, S> {
        PaginatedFetcher {
            source: self.source,
            page_size: self.page_size,
            retry: self.retry,
            sleeper: self.sleeper,
            progress,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch every page, passing `since` through as the remote lower bound.
    ///
    /// The remote bound may be inclusive, so callers still filter by the
    /// exact cutoff.
    pub fn fetch_all(&self, since: Option<NaiveDate>) -> Result<FetchOutcome, FetchError> {
        let mut observations = Vec::new();
        let mut pages = 0;
        let mut skipped_entries = 0;
        let mut offset = 0;

        let end = loop {
            let query = PageQuery {
                offset,
                length: self.page_size,
                start: since,
            };
            let body = self.get_with_retry(&query)?;

            match parse_page(&body) {
                Page::MissingEnvelope => break PageEnd::MissingEnvelope,
                Page::Data { entries, received } => {
                    pages += 1;
                    skipped_entries += received - entries.len();
                    observations.extend(entries);
                    self.progress.on_page(offset, received, observations.len());

                    if received < self.page_size {
                        break PageEnd::ShortPage;
                    }
                }
            }
            offset += self.page_size;
        };

        let outcome = FetchOutcome {
            observations,
            pages,
            end,
            skipped_entries,
        };
        self.progress.on_finish(&outcome);
        Ok(outcome)
    }

    /// One page, with up to `max_attempts` tries.
    fn get_with_retry(&self, query: &PageQuery) -> Result<String, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.source.get_page(query) {
                Ok(body) => return Ok(body),
                Err(e) if attempt >= max_attempts => {
                    return Err(FetchError::RetriesExhausted {
                        offset: query.offset,
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    self.progress
                        .on_retry(query.offset, attempt, max_attempts, &e);
                    (self.sleeper)(self.retry.delay_for(attempt));
                }
            }
        }
    }
}
